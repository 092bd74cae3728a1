//! Datadog webhook alert normalizer.
//!
//! Datadog sends one alert per webhook after substituting its `$`-variable
//! templates, so this normalizer only ever sees final values.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::{AlertStatus, Severity};

use super::Normalizer;

fn title_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\[(?:Triggered|Recovered|Re-Triggered|No Data|Warn)\]\s*").unwrap())
}

fn extract_severity(payload: &Value) -> Severity {
    let priority = payload.get("priority").and_then(Value::as_str).unwrap_or("").to_lowercase();
    match priority.trim() {
        "p1" => return Severity::Critical,
        "p2" => return Severity::High,
        "p3" => return Severity::Warning,
        "p4" => return Severity::Low,
        "p5" => return Severity::Info,
        _ => {}
    }

    let alert_type = payload.get("alert_type").and_then(Value::as_str).unwrap_or("").to_lowercase();
    match alert_type.trim() {
        "error" => Severity::Critical,
        "warning" => Severity::Warning,
        "info" | "success" => Severity::Info,
        _ => Severity::Warning,
    }
}

fn extract_status(payload: &Value) -> AlertStatus {
    let transition = payload.get("alert_transition").and_then(Value::as_str).unwrap_or("").to_lowercase();
    match transition.trim() {
        "triggered" | "re-triggered" | "no data" | "warn" => AlertStatus::Firing,
        "recovered" => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

/// Datadog tags are comma-separated `key:value` pairs; a tag with no colon
/// is stored with an empty value.
fn parse_tags(tags_str: &str) -> Labels {
    let mut result = Labels::new();
    if tags_str.trim().is_empty() {
        return result;
    }
    for tag in tags_str.split(',') {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        match tag.split_once(':') {
            Some((key, value)) => {
                result.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                result.insert(tag.to_string(), String::new());
            }
        }
    }
    result
}

fn clean_title(title: &str) -> String {
    title_prefix_re().replace(title, "").trim().to_string()
}

pub struct DatadogNormalizer;

impl Normalizer for DatadogNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        if payload.get("title").is_none() {
            return false;
        }
        payload.get("alert_transition").is_some() || payload.get("alert_type").is_some()
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let title = payload.get("title").and_then(Value::as_str).unwrap_or("Datadog Alert");
        let name = clean_title(title);

        let severity = extract_severity(payload);
        let status = extract_status(payload);

        let mut tags = payload.get("tags").and_then(Value::as_str).map(parse_tags).unwrap_or_default();
        let service = tags.shift_remove("service");
        let environment = tags.shift_remove("env").or_else(|| tags.shift_remove("environment"));

        let host = payload.get("hostname").and_then(Value::as_str).map(|s| s.to_string());
        let description = payload.get("text").and_then(Value::as_str).map(|s| s.to_string());
        let generator_url = payload
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| payload.get("link").and_then(Value::as_str))
            .map(|s| s.to_string());

        let starts_at = payload
            .get("date")
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse::<i64>().ok())))
            .and_then(|epoch| chrono::DateTime::from_timestamp(epoch, 0));

        let mut labels = tags;
        if let Some(id) = payload.get("alert_id") {
            let s = match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            labels.insert("datadog_alert_id".into(), s);
        }
        if let Some(event_type) = payload.get("event_type").and_then(Value::as_str) {
            labels.insert("datadog_event_type".into(), event_type.to_string());
        }
        if let Some(org_name) = payload.get("org").and_then(|o| o.get("name")).and_then(Value::as_str) {
            labels.insert("datadog_org".into(), org_name.to_string());
        }

        let mut annotations = Labels::new();
        if let Some(link) = payload.get("link").and_then(Value::as_str) {
            annotations.insert("event_link".into(), link.to_string());
        }

        vec![NormalizedAlert {
            name,
            source: "datadog".into(),
            severity,
            status,
            description,
            service,
            environment,
            host,
            labels,
            annotations,
            starts_at,
            generator_url,
            raw_payload: payload.clone(),
            ..Default::default()
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        serde_json::json!({
            "title": "[Triggered] CPU is high on web-01",
            "text": "CPU usage is above 95% for the last 10 minutes.",
            "date": 1705305600,
            "alert_type": "error",
            "alert_transition": "Triggered",
            "event_type": "metric_alert_monitor",
            "hostname": "web-01",
            "priority": "P1",
            "tags": "service:api,env:production,team:backend",
            "org": {"id": "12345", "name": "MyOrg"},
            "url": "https://app.datadoghq.com/monitors#123456",
            "link": "https://app.datadoghq.com/event/event?id=123456"
        })
    }

    #[test]
    fn validates_title_plus_datadog_specific_field() {
        let n = DatadogNormalizer;
        assert!(n.validate(&sample()));
        assert!(!n.validate(&serde_json::json!({"title": "x"})));
    }

    #[test]
    fn strips_title_prefix_and_maps_priority_over_alert_type() {
        let n = DatadogNormalizer;
        let alerts = n.normalize(&sample());
        let a = &alerts[0];
        assert_eq!(a.name, "CPU is high on web-01");
        assert_eq!(a.severity, Severity::Critical);
        assert_eq!(a.status, AlertStatus::Firing);
        assert_eq!(a.service.as_deref(), Some("api"));
        assert_eq!(a.environment.as_deref(), Some("production"));
        assert!(!a.labels.contains_key("service"));
        assert!(!a.labels.contains_key("env"));
        assert_eq!(a.labels.get("team").map(|s| s.as_str()), Some("backend"));
        assert_eq!(a.labels.get("datadog_org").map(|s| s.as_str()), Some("MyOrg"));
        assert!(a.starts_at.is_some());
    }

    #[test]
    fn recovered_transition_maps_to_resolved() {
        let mut payload = sample();
        payload["alert_transition"] = Value::String("Recovered".into());
        payload["title"] = Value::String("[Recovered] CPU is high on web-01".into());
        let n = DatadogNormalizer;
        let alerts = n.normalize(&payload);
        assert_eq!(alerts[0].status, AlertStatus::Resolved);
        assert_eq!(alerts[0].name, "CPU is high on web-01");
    }

    #[test]
    fn valueless_tag_gets_empty_string() {
        let labels = parse_tags("standalone-tag,service:api");
        assert_eq!(labels.get("standalone-tag").map(|s| s.as_str()), Some(""));
    }
}
