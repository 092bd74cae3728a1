//! Splunk webhook alert normalizer.
//!
//! Splunk's webhook payload is minimal and carries only the first result
//! row from the saved search, with field names entirely determined by the
//! SPL query — so extraction here is heuristic, scanning priority-ordered
//! candidate keys. Shared with `splunk_email` for the richer all-rows case.

use serde_json::Value;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::{AlertStatus, Severity};

use super::Normalizer;

pub const SEVERITY_FIELD_KEYS: [&str; 7] =
    ["severity", "priority", "urgency", "level", "alert_severity", "risk_level", "risk_score"];
pub const HOST_FIELD_KEYS: [&str; 14] = [
    "host", "hostname", "src_host", "dest", "dest_host", "dvc", "dvc_host", "computer", "node",
    "instance", "ComputerName", "server", "src", "src_ip",
];
pub const SERVICE_FIELD_KEYS: [&str; 7] =
    ["service", "app", "application", "service_name", "sourcetype", "index", "source_app"];
pub const ENV_FIELD_KEYS: [&str; 7] =
    ["environment", "env", "tier", "stage", "datacenter", "dc", "region"];
pub const DESCRIPTION_FIELD_KEYS: [&str; 10] = [
    "message", "msg", "description", "summary", "reason", "details", "alert_message", "comment",
    "latest_error", "_raw",
];

/// Scan `result` for the first of `field_keys` with a non-blank value.
pub fn extract_from_result<'a>(result: &'a Value, field_keys: &[&str]) -> Option<String> {
    let obj = result.as_object()?;
    for key in field_keys {
        if let Some(v) = obj.get(*key) {
            let s = value_to_string(v);
            if !s.trim().is_empty() {
                return Some(s.trim().to_string());
            }
        }
    }
    None
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Severity heuristic: named alias, then numeric 1-5 scale, then 0-100
/// risk-score bucketing, defaulting to `warning`.
pub fn extract_severity(result: &Value) -> Severity {
    let Some(raw) = extract_from_result(result, &SEVERITY_FIELD_KEYS) else {
        return Severity::Warning;
    };
    let lowered = raw.to_lowercase();
    match lowered.as_str() {
        "critical" | "crit" | "urgent" => return Severity::Critical,
        "high" | "major" => return Severity::High,
        "medium" | "warning" | "warn" => return Severity::Warning,
        "low" | "minor" => return Severity::Low,
        "info" | "informational" => return Severity::Info,
        "5" => return Severity::Critical,
        "4" => return Severity::High,
        "3" => return Severity::Warning,
        "2" => return Severity::Low,
        "1" => return Severity::Info,
        _ => {}
    }
    if let Ok(score) = raw.parse::<f64>() {
        return Severity::from_risk_score(score);
    }
    Severity::Warning
}

/// Build a clean label set from `result` fields not already extracted,
/// skipping underscore-prefixed internal Splunk fields.
pub fn build_labels(result: &Value, extracted_keys: &std::collections::HashSet<&str>) -> Labels {
    let mut labels = Labels::new();
    if let Some(obj) = result.as_object() {
        for (k, v) in obj {
            if extracted_keys.contains(k.as_str()) {
                continue;
            }
            if k.starts_with('_') {
                continue;
            }
            let s = value_to_string(v);
            if !s.trim().is_empty() {
                labels.insert(k.clone(), s);
            }
        }
    }
    labels
}

fn all_extracted_keys() -> std::collections::HashSet<&'static str> {
    SEVERITY_FIELD_KEYS
        .iter()
        .chain(HOST_FIELD_KEYS.iter())
        .chain(SERVICE_FIELD_KEYS.iter())
        .chain(ENV_FIELD_KEYS.iter())
        .chain(DESCRIPTION_FIELD_KEYS.iter())
        .copied()
        .collect()
}

pub struct SplunkNormalizer;

impl Normalizer for SplunkNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        payload.get("sid").is_some() && payload.get("result").map(Value::is_object).unwrap_or(false)
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let default_result = Value::Object(Default::default());
        let result = payload.get("result").unwrap_or(&default_result);
        let sid = payload.get("sid").and_then(Value::as_str).unwrap_or("");
        let search_name = payload.get("search_name").and_then(Value::as_str);
        let results_link = payload.get("results_link").and_then(Value::as_str);
        let owner = payload.get("owner").and_then(Value::as_str);
        let app = payload.get("app").and_then(Value::as_str);

        let name = search_name
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Splunk Alert".to_string());

        let severity = extract_severity(result);
        let host = extract_from_result(result, &HOST_FIELD_KEYS);
        let service = extract_from_result(result, &SERVICE_FIELD_KEYS);
        let environment = extract_from_result(result, &ENV_FIELD_KEYS);
        let description = extract_from_result(result, &DESCRIPTION_FIELD_KEYS);

        let extracted = all_extracted_keys();
        let mut labels = build_labels(result, &extracted);
        if let Some(o) = owner {
            labels.insert("splunk_owner".into(), o.to_string());
        }
        if let Some(a) = app {
            labels.insert("splunk_app".into(), a.to_string());
        }
        if !sid.is_empty() {
            labels.insert("splunk_sid".into(), sid.to_string());
        }

        let mut annotations = Labels::new();
        if let Some(link) = results_link {
            annotations.insert("results_link".into(), link.to_string());
        }

        vec![NormalizedAlert {
            name,
            source: "splunk".into(),
            source_instance: results_link.map(|s| s.to_string()),
            severity,
            status: AlertStatus::Firing,
            description,
            service,
            environment,
            host,
            labels,
            annotations,
            generator_url: results_link.map(|s| s.to_string()),
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
            "sid": "scheduler_admin_search_W2",
            "results_link": "http://splunk/search?sid=1",
            "search_name": "High CPU Usage Alert",
            "owner": "admin",
            "app": "search",
            "result": {
                "host": "web-01",
                "sourcetype": "syslog",
                "count": "847",
                "severity": "high"
            }
        })
    }

    #[test]
    fn validates_on_sid_and_result() {
        let n = SplunkNormalizer;
        assert!(n.validate(&sample()));
        assert!(!n.validate(&serde_json::json!({"result": {}})));
    }

    #[test]
    fn extracts_host_and_severity_and_strips_extracted_fields_from_labels() {
        let n = SplunkNormalizer;
        let alerts = n.normalize(&sample());
        let a = &alerts[0];
        assert_eq!(a.host.as_deref(), Some("web-01"));
        assert_eq!(a.severity, Severity::High);
        assert!(!a.labels.contains_key("host"));
        assert!(a.labels.contains_key("count"));
        assert_eq!(a.labels.get("splunk_sid").map(|s| s.as_str()), Some("scheduler_admin_search_W2"));
    }

    #[test]
    fn risk_score_buckets_when_no_named_alias_matches() {
        let result = serde_json::json!({"risk_score": "85"});
        assert_eq!(extract_severity(&result), Severity::Critical);
    }
}
