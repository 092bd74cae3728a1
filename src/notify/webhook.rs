//! Generic outbound webhook delivery, per §6's documented envelope.

use std::collections::BTreeSet;

use serde_json::json;

use crate::config::Settings;
use crate::model::{Alert, ChannelType, Incident, IncidentEventType, NotificationChannel};

fn event_type_str(event_type: IncidentEventType) -> &'static str {
    match event_type {
        IncidentEventType::IncidentCreated => "incident_created",
        IncidentEventType::SeverityChanged => "severity_changed",
        IncidentEventType::IncidentResolved => "incident_resolved",
        IncidentEventType::AlertAdded => "alert_added",
        IncidentEventType::IncidentAcknowledged => "incident_acknowledged",
        IncidentEventType::IncidentAutoResolved => "incident_auto_resolved",
    }
}

pub fn format_envelope(incident: &Incident, alerts: &[Alert], event_type: IncidentEventType, settings: &Settings) -> serde_json::Value {
    let services: BTreeSet<&str> = alerts.iter().filter_map(|a| a.service.as_deref()).collect();
    let alert_summaries: Vec<_> = alerts
        .iter()
        .take(20)
        .map(|a| {
            json!({
                "id": a.id,
                "name": a.name,
                "severity": a.severity.as_str(),
                "status": a.status.as_str(),
                "service": a.service,
            })
        })
        .collect();

    json!({
        "event_type": event_type_str(event_type),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "source": "solace",
        "dashboard_url": settings.dashboard_url,
        "incident": {
            "id": incident.id,
            "title": incident.title,
            "status": incident.status.as_str(),
            "severity": incident.severity.as_str(),
            "started_at": incident.started_at,
            "acknowledged_at": incident.acknowledged_at,
            "resolved_at": incident.resolved_at,
            "alert_count": alerts.len(),
            "services": services.into_iter().collect::<Vec<_>>(),
            "alerts": alert_summaries,
        }
    })
}

pub async fn send(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    debug_assert_eq!(channel.channel_type, ChannelType::Webhook);
    let url = channel
        .config
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "webhook channel missing url in config".to_string())?;

    let body = format_envelope(incident, alerts, event_type, settings);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;
    let mut request = client.post(url).json(&body);

    if let Some(headers) = channel.config.get("headers").and_then(|v| v.as_object()) {
        for (k, v) in headers {
            if let Some(v) = v.as_str() {
                request = request.header(k.as_str(), v);
            }
        }
    }
    if let Some(secret) = channel.config.get("secret").and_then(|v| v.as_str()) {
        request = request.header("X-Solace-Secret", secret);
    }

    let response = request.send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("webhook returned {}", response.status()));
    }
    Ok(())
}
