//! Microsoft Teams delivery: an Adaptive Card v1.4 wrapped in a
//! `message`-type connector attachment, posted to an incoming webhook URL.

use std::collections::BTreeSet;

use serde_json::json;

use crate::config::Settings;
use crate::model::{Alert, ChannelType, Incident, IncidentEventType, NotificationChannel};

use super::event_label;

pub fn format_message(incident: &Incident, alerts: &[Alert], event_type: IncidentEventType, settings: &Settings) -> serde_json::Value {
    let severity = incident.severity.as_str();
    let label = event_label(event_type);
    let services: BTreeSet<&str> = alerts.iter().filter_map(|a| a.service.as_deref()).collect();
    let service_text = if services.is_empty() {
        "unknown".to_string()
    } else {
        services.into_iter().collect::<Vec<_>>().join(", ")
    };

    let card = json!({
        "type": "AdaptiveCard",
        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
        "version": "1.4",
        "body": [
            {
                "type": "TextBlock",
                "text": label,
                "weight": "Bolder",
                "size": "Medium",
                "color": adaptive_color(severity)
            },
            {
                "type": "TextBlock",
                "text": incident.title,
                "weight": "Bolder",
                "wrap": true
            },
            {
                "type": "FactSet",
                "facts": [
                    {"title": "Severity", "value": severity.to_uppercase()},
                    {"title": "Alerts", "value": alerts.len().to_string()},
                    {"title": "Service", "value": service_text},
                    {"title": "Status", "value": incident.status.as_str().to_string()}
                ]
            }
        ],
        "actions": [
            {
                "type": "Action.OpenUrl",
                "title": "View in Solace",
                "url": settings.dashboard_url
            }
        ]
    });

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": card
        }]
    })
}

fn adaptive_color(severity: &str) -> &'static str {
    match severity {
        "critical" | "high" => "Attention",
        "warning" => "Warning",
        _ => "Default",
    }
}

pub async fn send(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    debug_assert_eq!(channel.channel_type, ChannelType::Teams);
    let webhook_url = channel
        .config
        .get("webhook_url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "teams channel missing webhook_url in config".to_string())?;

    let message = format_message(incident, alerts, event_type, settings);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.post(webhook_url).json(&message).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("teams webhook returned {}", response.status()));
    }
    Ok(())
}
