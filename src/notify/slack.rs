//! Slack incoming-webhook delivery: Block Kit attachment per §6.

use std::collections::BTreeSet;

use serde_json::json;

use crate::config::Settings;
use crate::model::{Alert, ChannelType, Incident, IncidentEventType, NotificationChannel};

use super::{event_label, severity_color};

pub fn format_message(incident: &Incident, alerts: &[Alert], event_type: IncidentEventType, settings: &Settings) -> serde_json::Value {
    let severity = incident.severity.as_str();
    let color = severity_color(severity);
    let label = event_label(event_type);
    let services: BTreeSet<&str> = alerts.iter().filter_map(|a| a.service.as_deref()).collect();
    let service_text = if services.is_empty() {
        "unknown".to_string()
    } else {
        services.into_iter().collect::<Vec<_>>().join(", ")
    };

    json!({
        "attachments": [{
            "color": color,
            "blocks": [
                {
                    "type": "section",
                    "text": {"type": "mrkdwn", "text": format!("*{}*\n*{}*", label, incident.title)}
                },
                {
                    "type": "section",
                    "fields": [
                        {"type": "mrkdwn", "text": format!("*Severity:* {}", severity.to_uppercase())},
                        {"type": "mrkdwn", "text": format!("*Alerts:* {}", alerts.len())},
                        {"type": "mrkdwn", "text": format!("*Service:* {}", service_text)},
                        {"type": "mrkdwn", "text": format!("*Status:* {}", incident.status.as_str())}
                    ]
                },
                {
                    "type": "context",
                    "elements": [
                        {"type": "mrkdwn", "text": format!("<{}|View in Solace>", settings.dashboard_url)}
                    ]
                }
            ]
        }]
    })
}

pub async fn send(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    debug_assert_eq!(channel.channel_type, ChannelType::Slack);
    let webhook_url = channel
        .config
        .get("webhook_url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "slack channel missing webhook_url in config".to_string())?;

    let message = format_message(incident, alerts, event_type, settings);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.post(webhook_url).json(&message).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("slack webhook returned {}", response.status()));
    }
    Ok(())
}
