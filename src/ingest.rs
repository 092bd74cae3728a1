//! Ingestion coordinator (C9): normalize → dedup → runbook → silence →
//! persist → correlate → notify → emit, per §4.9. All nine steps run
//! against a single `Store`, so every state transition is visible to
//! readers as soon as this function returns.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::config::Settings;
use crate::correlation::{self, CorrelationTrigger};
use crate::dedup::{self, DedupOutcome};
use crate::error::AppError;
use crate::events::{DomainEvent, EventSink};
use crate::fingerprint::{self, FingerprintInput};
use crate::model::Alert;
use crate::normalize;
use crate::notify;
use crate::runbook;
use crate::severity::AlertStatus;
use crate::silence;
use crate::store::Store;

#[derive(Debug)]
pub struct IngestOutcome {
    pub alert: Alert,
    pub is_duplicate: bool,
    pub incident_id: Option<Uuid>,
}

/// Ingest a single provider payload, per §4.9's numbered steps.
///
/// Returns one `IngestOutcome` per alert the normalizer extracted — a
/// single webhook call (e.g. a Prometheus batch) can carry several.
pub async fn ingest(
    store: &Arc<dyn Store>,
    events: &Arc<dyn EventSink>,
    settings: &Settings,
    provider: &str,
    payload: serde_json::Value,
) -> Result<Vec<IngestOutcome>, AppError> {
    let normalizer = normalize::registry(provider)
        .ok_or_else(|| AppError::Validation(format!("unknown provider: {provider}")))?;

    if !normalizer.validate(&payload) {
        return Err(AppError::Validation(format!("payload does not match the {provider} schema")));
    }

    let normalized = normalizer.normalize(&payload);
    if normalized.is_empty() {
        return Err(AppError::Validation("normalizer extracted zero alerts".into()));
    }

    let mut outcomes = Vec::with_capacity(normalized.len());
    for alert_data in normalized {
        let outcome = ingest_one(store, events, settings, alert_data).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn ingest_one(
    store: &Arc<dyn Store>,
    events: &Arc<dyn EventSink>,
    settings: &Settings,
    mut alert_data: crate::model::NormalizedAlert,
) -> Result<IngestOutcome, AppError> {
    let now = Utc::now();

    // Step 2: fingerprint + dedup.
    let fp_input = FingerprintInput::from_normalized(&alert_data);
    let fp = fingerprint::fingerprint(&fp_input);

    match dedup::process(store, &fp, settings.dedup_window(), now, alert_data.raw_payload.clone()).await? {
        DedupOutcome::Duplicate(updated) => {
            events.publish(DomainEvent::AlertUpdated(alert_payload(&updated)));
            return Ok(IngestOutcome {
                incident_id: updated.incident_id,
                is_duplicate: true,
                alert: updated,
            });
        }
        DedupOutcome::New => {}
    }

    // Step 3: runbook resolution, only if the provider didn't already set one.
    if alert_data.runbook_url.is_none() {
        let rules = store.list_active_runbook_rules().await?;
        if let Some(rule) = runbook::find_matching_rule(&rules, alert_data.service.as_deref(), &alert_data.name) {
            alert_data.runbook_url = Some(runbook::resolve_template(
                &rule.runbook_url_template,
                alert_data.service.as_deref(),
                alert_data.host.as_deref(),
                &alert_data.name,
                alert_data.environment.as_deref(),
            ));
        }
    }

    // Determine persisted status before silence/correlation: firing
    // unless the provider said resolved with an end time.
    let status = if alert_data.status == AlertStatus::Resolved && alert_data.ends_at.is_some() {
        AlertStatus::Resolved
    } else {
        AlertStatus::Firing
    };
    alert_data.status = status;

    let mut alert = Alert::from_normalized(alert_data, fp, now);

    // Step 4: silence check — suppressed alerts skip correlation and dispatch.
    let active_silences = store.list_active_silences(now).await?;
    if silence::check_silence(&active_silences, &alert).is_some() {
        alert.status = AlertStatus::Suppressed;
        let alert = store.insert_alert(alert).await?;
        events.publish(DomainEvent::AlertCreated(alert_payload(&alert)));
        return Ok(IngestOutcome { incident_id: None, is_duplicate: false, alert });
    }

    // Step 5-6: persist alert; `insert_alert` records the initial occurrence.
    let mut alert = store.insert_alert(alert).await?;

    // Step 7: correlate.
    let correlation = correlation::correlate(store, &alert, settings.correlation_window(), now).await?;

    let incident_id = correlation.as_ref().map(|o| o.incident.id);
    if let Some(incident_id) = incident_id {
        alert.incident_id = Some(incident_id);
        alert = store.update_alert(alert).await?;
    }

    // Step 8: dispatch notifications for trigger events.
    if let Some(outcome) = &correlation {
        let event_type = match outcome.trigger {
            CorrelationTrigger::IncidentCreated => Some(crate::model::IncidentEventType::IncidentCreated),
            CorrelationTrigger::SeverityChanged => Some(crate::model::IncidentEventType::SeverityChanged),
            CorrelationTrigger::IncidentResolved => Some(crate::model::IncidentEventType::IncidentResolved),
            CorrelationTrigger::None => None,
        };
        if let Some(event_type) = event_type {
            notify::dispatch(store, settings, &outcome.incident, event_type).await?;
        }
    }

    // Step 9: real-time events.
    events.publish(DomainEvent::AlertCreated(alert_payload(&alert)));
    if let Some(outcome) = &correlation {
        let event = match outcome.trigger {
            CorrelationTrigger::IncidentCreated => DomainEvent::IncidentCreated(incident_payload(&outcome.incident)),
            _ => DomainEvent::IncidentUpdated(incident_payload(&outcome.incident)),
        };
        events.publish(event);
    }

    Ok(IngestOutcome { incident_id, is_duplicate: false, alert })
}

fn alert_payload(alert: &Alert) -> serde_json::Value {
    json!({
        "id": alert.id,
        "fingerprint": alert.fingerprint,
        "name": alert.name,
        "severity": alert.severity.as_str(),
        "status": alert.status.as_str(),
        "service": alert.service,
        "incident_id": alert.incident_id,
        "duplicate_count": alert.duplicate_count,
    })
}

fn incident_payload(incident: &crate::model::Incident) -> serde_json::Value {
    json!({
        "id": incident.id,
        "title": incident.title,
        "status": incident.status.as_str(),
        "severity": incident.severity.as_str(),
        "started_at": incident.started_at,
    })
}

