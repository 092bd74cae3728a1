//! Correlation (C6): attach alerts to open incidents, promote severity,
//! and auto-resolve when every member alert resolves.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Alert, Incident, IncidentEvent, IncidentEventType};
use crate::severity::{AlertStatus, IncidentStatus, Severity};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationTrigger {
    IncidentCreated,
    SeverityChanged,
    IncidentResolved,
    None,
}

pub struct CorrelationOutcome {
    pub incident: Incident,
    pub trigger: CorrelationTrigger,
}

/// Correlate a freshly persisted, non-suppressed alert.
///
/// Preconditions: `alert.status` is `firing` or `resolved` (never
/// `suppressed`). Callers handle the resolved-with-existing-incident path
/// before falling through to the general attach/create logic.
pub async fn correlate(
    store: &Arc<dyn Store>,
    alert: &Alert,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Option<CorrelationOutcome>, AppError> {
    if alert.status == AlertStatus::Resolved {
        if let Some(incident_id) = alert.incident_id {
            let members = store.alerts_for_incident(incident_id).await?;
            let all_resolved = members.iter().all(|a| a.status == AlertStatus::Resolved);
            if all_resolved {
                if let Some(mut incident) = store.get_incident(incident_id).await? {
                    incident.status = IncidentStatus::Resolved;
                    incident.resolved_at = Some(now);
                    let incident = store.update_incident(incident).await?;
                    store
                        .append_incident_event(IncidentEvent {
                            id: Uuid::new_v4(),
                            incident_id,
                            event_type: IncidentEventType::IncidentAutoResolved,
                            actor: Some("system".into()),
                            data: json!({}),
                            created_at: now,
                        })
                        .await?;
                    return Ok(Some(CorrelationOutcome {
                        incident,
                        trigger: CorrelationTrigger::IncidentResolved,
                    }));
                }
            }
            return Ok(None);
        }
    }

    match &alert.service {
        None => Ok(Some(create_and_attach(store, alert, now).await?)),
        Some(service) => match store.find_correlatable_incident(service, window, now).await? {
            Some(existing) => attach(store, existing, alert, now).await.map(Some),
            None => Ok(Some(create_and_attach(store, alert, now).await?)),
        },
    }
}

async fn create_incident(
    store: &Arc<dyn Store>,
    alert: &Alert,
    now: DateTime<Utc>,
) -> Result<Incident, AppError> {
    let title = match &alert.service {
        Some(service) => format!("{service} — {}", alert.name),
        None => alert.name.clone(),
    };
    let incident = Incident {
        id: Uuid::new_v4(),
        title,
        status: IncidentStatus::Open,
        severity: alert.severity,
        summary: None,
        phase: None,
        started_at: alert.starts_at.unwrap_or(now),
        acknowledged_at: None,
        resolved_at: None,
        created_at: now,
    };
    let incident = store.create_incident(incident).await?;
    store
        .append_incident_event(IncidentEvent {
            id: Uuid::new_v4(),
            incident_id: incident.id,
            event_type: IncidentEventType::IncidentCreated,
            actor: Some("system".into()),
            data: json!({ "alert_id": alert.id }),
            created_at: now,
        })
        .await?;
    Ok(incident)
}

async fn create_and_attach(
    store: &Arc<dyn Store>,
    alert: &Alert,
    now: DateTime<Utc>,
) -> Result<CorrelationOutcome, AppError> {
    let incident = create_incident(store, alert, now).await?;
    store.attach_alert_to_incident(alert.id, incident.id).await?;
    store
        .append_incident_event(IncidentEvent {
            id: Uuid::new_v4(),
            incident_id: incident.id,
            event_type: IncidentEventType::AlertAdded,
            actor: Some("system".into()),
            data: json!({ "alert_id": alert.id }),
            created_at: now,
        })
        .await?;
    Ok(CorrelationOutcome {
        incident,
        trigger: CorrelationTrigger::IncidentCreated,
    })
}

async fn attach(
    store: &Arc<dyn Store>,
    mut incident: Incident,
    alert: &Alert,
    now: DateTime<Utc>,
) -> Result<CorrelationOutcome, AppError> {
    store.attach_alert_to_incident(alert.id, incident.id).await?;

    let new_sev = Severity::max(incident.severity, alert.severity);
    let mut trigger = CorrelationTrigger::None;

    if new_sev > incident.severity {
        // NOTE: `from` is the new severity's predecessor in the ordered
        // enum, not the incident's actual prior severity — this reproduces
        // a documented quirk of the original implementation rather than
        // fixing it (see design notes).
        let from = new_sev.predecessor();
        incident.severity = new_sev;
        incident = store.update_incident(incident).await?;
        store
            .append_incident_event(IncidentEvent {
                id: Uuid::new_v4(),
                incident_id: incident.id,
                event_type: IncidentEventType::SeverityChanged,
                actor: Some("system".into()),
                data: json!({ "from": from.as_str(), "to": new_sev.as_str() }),
                created_at: now,
            })
            .await?;
        trigger = CorrelationTrigger::SeverityChanged;
    }

    store
        .append_incident_event(IncidentEvent {
            id: Uuid::new_v4(),
            incident_id: incident.id,
            event_type: IncidentEventType::AlertAdded,
            actor: Some("system".into()),
            data: json!({ "alert_id": alert.id }),
            created_at: now,
        })
        .await?;

    Ok(CorrelationOutcome { incident, trigger })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedAlert;
    use crate::store::memory::MemoryStore;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn persisted_alert(
        store: &Arc<dyn Store>,
        name: &str,
        service: &str,
        severity: Severity,
        now: DateTime<Utc>,
    ) -> Alert {
        let alert = Alert::from_normalized(
            NormalizedAlert {
                name: name.into(),
                source: "generic".into(),
                severity,
                service: Some(service.into()),
                ..Default::default()
            },
            format!("fp-{name}"),
            now,
        );
        store.insert_alert(alert.clone()).await.unwrap();
        alert
    }

    #[tokio::test]
    async fn two_alerts_same_service_correlate_into_one_incident_with_max_severity() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");

        let a = persisted_alert(&store, "HighCPU", "api", Severity::Warning, t0).await;
        let outcome_a = correlate(&store, &a, Duration::from_secs(600), t0).await.unwrap().unwrap();
        assert_eq!(outcome_a.trigger, CorrelationTrigger::IncidentCreated);

        let t1 = t0 + chrono::Duration::seconds(60);
        let b = persisted_alert(&store, "HighMemory", "api", Severity::Critical, t1).await;
        let outcome_b = correlate(&store, &b, Duration::from_secs(600), t1).await.unwrap().unwrap();

        assert_eq!(outcome_b.incident.id, outcome_a.incident.id);
        assert_eq!(outcome_b.incident.severity, Severity::Critical);
        assert_eq!(outcome_b.trigger, CorrelationTrigger::SeverityChanged);

        let members = store.alerts_for_incident(outcome_b.incident.id).await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn severity_changed_from_field_is_new_severitys_predecessor_not_prior_severity() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");

        let a = persisted_alert(&store, "A", "api", Severity::Info, t0).await;
        correlate(&store, &a, Duration::from_secs(600), t0).await.unwrap();

        let b = persisted_alert(&store, "B", "api", Severity::Critical, t0).await;
        let outcome = correlate(&store, &b, Duration::from_secs(600), t0).await.unwrap().unwrap();

        let events = store.list_incident_events(outcome.incident.id).await.unwrap();
        let severity_changed = events
            .iter()
            .find(|e| e.event_type == IncidentEventType::SeverityChanged)
            .unwrap();
        // Critical's predecessor is High — NOT Info, the incident's actual
        // prior severity. This asserts the faithfully-reproduced quirk.
        assert_eq!(severity_changed.data["from"], "high");
        assert_eq!(severity_changed.data["to"], "critical");
    }

    #[tokio::test]
    async fn incident_without_service_is_standalone() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");
        let alert = Alert::from_normalized(
            NormalizedAlert {
                name: "Standalone".into(),
                source: "generic".into(),
                severity: Severity::Low,
                service: None,
                ..Default::default()
            },
            "fp-standalone".into(),
            t0,
        );
        store.insert_alert(alert.clone()).await.unwrap();
        let outcome = correlate(&store, &alert, Duration::from_secs(600), t0).await.unwrap().unwrap();
        assert_eq!(outcome.incident.title, "Standalone");
    }

    #[tokio::test]
    async fn auto_resolve_when_all_members_resolved() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");

        let mut a = persisted_alert(&store, "A", "api", Severity::Warning, t0).await;
        let outcome = correlate(&store, &a, Duration::from_secs(600), t0).await.unwrap().unwrap();
        a.incident_id = Some(outcome.incident.id);
        a.status = AlertStatus::Resolved;
        store.update_alert(a.clone()).await.unwrap();

        let resolved_outcome = correlate(&store, &a, Duration::from_secs(600), t0).await.unwrap().unwrap();
        assert_eq!(resolved_outcome.incident.status, IncidentStatus::Resolved);
    }
}
