//! PagerDuty Events API v2 delivery, per §6 and the idempotency rule in
//! §4.7: `dedup_key = "solace-incident-" + incident.id`.

use serde_json::json;

use crate::config::Settings;
use crate::model::{Alert, ChannelType, Incident, IncidentEventType, NotificationChannel};

const PAGERDUTY_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

fn event_action(event_type: IncidentEventType) -> &'static str {
    match event_type {
        IncidentEventType::IncidentResolved | IncidentEventType::IncidentAutoResolved => "resolve",
        _ => "trigger",
    }
}

pub fn format_event(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Option<serde_json::Value> {
    let routing_key = channel.config.get("routing_key").and_then(|v| v.as_str())?;
    let action = event_action(event_type);
    let dedup_key = format!("solace-incident-{}", incident.id);

    let mut body = json!({
        "routing_key": routing_key,
        "event_action": action,
        "dedup_key": dedup_key,
    });

    if action == "trigger" {
        body["payload"] = json!({
            "summary": incident.title,
            "severity": incident.severity.as_str(),
            "source": "solace",
            "component": alerts.first().and_then(|a| a.service.clone()).unwrap_or_else(|| "unknown".into()),
            "custom_details": {
                "alert_count": alerts.len(),
                "status": incident.status.as_str(),
            }
        });
        body["links"] = json!([{"href": settings.dashboard_url, "text": "View in Solace"}]);
    }

    Some(body)
}

pub async fn send(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    debug_assert_eq!(channel.channel_type, ChannelType::Pagerduty);
    let body = format_event(channel, incident, alerts, event_type, settings)
        .ok_or_else(|| "pagerduty channel missing routing_key in config".to_string())?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.post(PAGERDUTY_EVENTS_URL).json(&body).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("pagerduty events api returned {}", response.status()));
    }
    Ok(())
}
