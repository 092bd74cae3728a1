//! SMTP email delivery: synthesized HTML body with an alert table, per §6.

use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::config::Settings;
use crate::model::{Alert, ChannelType, Incident, IncidentEventType, NotificationChannel};

use super::event_label;

/// Returns `(subject, html_body)`.
pub fn format_html(incident: &Incident, alerts: &[Alert], event_type: IncidentEventType, settings: &Settings) -> (String, String) {
    let severity = incident.severity.as_str().to_uppercase();
    let label = event_label(event_type);
    let subject = format!("[Solace] [{}] {}: {}", severity, label, incident.title);

    let td = "padding:6px 12px;border-bottom:1px solid #1e2736";
    let mut alert_rows = String::new();
    for alert in alerts.iter().take(10) {
        let svc = alert.service.as_deref().unwrap_or("-");
        alert_rows.push_str(&format!(
            "<tr><td style=\"{td}\">{}</td><td style=\"{td}\">{}</td><td style=\"{td}\">{}</td><td style=\"{td}\">{}</td></tr>",
            alert.name,
            alert.severity.as_str(),
            alert.status.as_str(),
            svc,
        ));
    }

    let alerts_table = if alert_rows.is_empty() {
        String::new()
    } else {
        format!(
            r#"<h3 style="color:#e8ecf1;margin-top:24px;">Correlated Alerts</h3>
            <table style="width:100%;border-collapse:collapse;font-size:13px;">
                <tr style="background:#111720;">
                    <th style="padding:8px 12px;text-align:left;color:#3d4f65;">Name</th>
                    <th style="padding:8px 12px;text-align:left;color:#3d4f65;">Severity</th>
                    <th style="padding:8px 12px;text-align:left;color:#3d4f65;">Status</th>
                    <th style="padding:8px 12px;text-align:left;color:#3d4f65;">Service</th>
                </tr>
                {alert_rows}
            </table>"#
        )
    };

    let html = format!(
        r#"<div style="font-family:sans-serif;max-width:600px;margin:0 auto;background:#0a0e14;color:#c5cdd8;padding:24px;border-radius:8px">
            <h2 style="color:#e8ecf1;margin-top:0;">{label}</h2>
            <table style="width:100%;border-collapse:collapse;margin-bottom:16px;">
                <tr><td style="padding:8px 0;color:#3d4f65;">Incident</td><td style="padding:8px 0;color:#e8ecf1;font-weight:600;">{}</td></tr>
                <tr><td style="padding:8px 0;color:#3d4f65;">Severity</td><td style="padding:8px 0;color:#e8ecf1;font-weight:600;">{severity}</td></tr>
                <tr><td style="padding:8px 0;color:#3d4f65;">Alert Count</td><td style="padding:8px 0;color:#e8ecf1;">{}</td></tr>
                <tr><td style="padding:8px 0;color:#3d4f65;">Status</td><td style="padding:8px 0;color:#e8ecf1;">{}</td></tr>
            </table>
            {alerts_table}
            <p style="margin-top:24px;"><a href="{}" style="color:#10b981;">View in Solace</a></p>
        </div>"#,
        incident.title,
        alerts.len(),
        incident.status.as_str(),
        settings.dashboard_url,
    );

    (subject, html)
}

pub async fn send(
    channel: &NotificationChannel,
    incident: &Incident,
    alerts: &[Alert],
    event_type: IncidentEventType,
    settings: &Settings,
) -> Result<(), String> {
    debug_assert_eq!(channel.channel_type, ChannelType::Email);
    let smtp_host = settings.smtp_host.as_deref().ok_or_else(|| "SMTP not configured (smtp_host unset)".to_string())?;

    let recipients: Vec<String> = channel
        .config
        .get("recipients")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    if recipients.is_empty() {
        return Err("email channel missing recipients in config".to_string());
    }

    let from_address = channel
        .config
        .get("from_address")
        .and_then(|v| v.as_str())
        .unwrap_or(&settings.smtp_from_address);

    let (subject, html_body) = format_html(incident, alerts, event_type, settings);

    let from_mailbox: Mailbox = from_address.parse().map_err(|e| format!("invalid from address: {e}"))?;

    let mut builder = Message::builder().from(from_mailbox).subject(subject);
    for recipient in &recipients {
        let mailbox: Mailbox = recipient.parse().map_err(|e| format!("invalid recipient {recipient}: {e}"))?;
        builder = builder.to(mailbox);
    }
    let message = builder
        .header(ContentType::TEXT_HTML)
        .body(html_body)
        .map_err(|e| e.to_string())?;

    let mut transport_builder = if settings.smtp_use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host).map_err(|e| e.to_string())?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
    }
    .port(settings.smtp_port);

    if let (Some(user), Some(password)) = (&settings.smtp_user, &settings.smtp_password) {
        transport_builder = transport_builder.credentials(Credentials::new(user.clone(), password.clone()));
    }

    let transport = transport_builder.build();
    transport.send(message).await.map_err(|e| e.to_string())?;
    Ok(())
}
