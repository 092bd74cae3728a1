//! Notification dispatch (C7): fan out an incident event to every active,
//! matching channel. Each channel send is isolated — one failure never
//! blocks or cancels another.

pub mod email;
pub mod pagerduty;
pub mod slack;
pub mod teams;
pub mod webhook;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::config::Settings;
use crate::error::AppError;
use crate::model::{
    Alert, ChannelType, Incident, IncidentEventType, NotificationChannel, NotificationLog,
    NotificationStatus,
};
use crate::store::Store;

pub const SEVERITY_COLORS: [(&str, &str); 5] = [
    ("critical", "#ef4444"),
    ("high", "#f97316"),
    ("warning", "#eab308"),
    ("low", "#3b82f6"),
    ("info", "#6b7280"),
];

pub fn severity_color(severity: &str) -> &'static str {
    SEVERITY_COLORS.iter().find(|(s, _)| *s == severity).map(|(_, c)| *c).unwrap_or("#6b7280")
}

pub fn event_label(event_type: IncidentEventType) -> &'static str {
    match event_type {
        IncidentEventType::IncidentCreated => "New Incident",
        IncidentEventType::SeverityChanged => "Severity Escalated",
        IncidentEventType::IncidentResolved => "Incident Resolved",
        IncidentEventType::AlertAdded => "Alert Added",
        IncidentEventType::IncidentAcknowledged => "Incident Acknowledged",
        IncidentEventType::IncidentAutoResolved => "Incident Auto-Resolved",
    }
}

/// §4.7.a — severity/service channel filters. Missing or empty list matches.
pub fn matches_filters(channel: &NotificationChannel, incident: &Incident, alerts: &[Alert]) -> bool {
    let severities = &channel.filters.severity;
    if !severities.is_empty() && !severities.iter().any(|s| s == incident.severity.as_str()) {
        return false;
    }

    let services = &channel.filters.service;
    if !services.is_empty() {
        let incident_services: HashSet<&str> = alerts.iter().filter_map(|a| a.service.as_deref()).collect();
        if !services.iter().any(|s| incident_services.contains(s.as_str())) {
            return false;
        }
    }

    true
}

async fn send_to_channel(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    match channel.channel_type {
        ChannelType::Slack => slack::send(channel, incident, alerts, event_type, settings).await,
        ChannelType::Email => email::send(channel, incident, alerts, event_type, settings).await,
        ChannelType::Teams => teams::send(channel, incident, alerts, event_type, settings).await,
        ChannelType::Webhook => webhook::send(channel, incident, alerts, event_type, settings).await,
        ChannelType::Pagerduty => pagerduty::send(channel, incident, alerts, event_type, settings).await,
    }
}

/// Dispatch `(incident, event_type)` to every active matching channel,
/// per §4.7. Only `incident_created`, `severity_changed`, and
/// `incident_resolved` are dispatched — callers must filter upstream.
pub async fn dispatch(
    store: &Arc<dyn Store>,
    settings: &Settings,
    incident: &Incident,
    event_type: IncidentEventType,
) -> Result<(), AppError> {
    let channels = store.list_active_channels().await?;
    if channels.is_empty() {
        return Ok(());
    }

    let alerts = store.alerts_for_incident(incident.id).await?;

    for channel in channels {
        if !matches_filters(&channel, incident, &alerts) {
            continue;
        }

        let now = Utc::now();
        let allowed = store
            .check_and_set_cooldown(channel.id, incident.id, now, settings.notification_cooldown())
            .await?;
        if !allowed {
            tracing::debug!(channel = %channel.name, incident = %incident.title, "notification rate-limited");
            continue;
        }

        let log = NotificationLog {
            id: uuid::Uuid::new_v4(),
            channel_id: channel.id,
            incident_id: incident.id,
            event_type,
            status: NotificationStatus::Pending,
            error_message: None,
            sent_at: None,
            created_at: now,
        };
        let log = store.insert_notification_log(log).await?;

        let outcome = send_to_channel(&channel, incident, &alerts, event_type, settings).await;

        let mut log = log;
        match outcome {
            Ok(()) => {
                log.status = NotificationStatus::Sent;
                log.sent_at = Some(Utc::now());
                tracing::info!(channel = %channel.name, incident = %incident.title, ?event_type, "notification sent");
            }
            Err(err) => {
                log.status = NotificationStatus::Failed;
                log.error_message = Some(AppError::truncate_message(&err));
                tracing::warn!(channel = %channel.name, incident = %incident.title, error = %err, "notification failed");
            }
        }
        store.update_notification_log(log).await?;
    }

    Ok(())
}
