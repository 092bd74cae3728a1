//! Prometheus Alertmanager webhook normalizer (v4 webhook format).

use serde_json::Value;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::{AlertStatus, Severity};

use super::Normalizer;

const SERVICE_KEYS: [&str; 5] = ["service", "app", "application", "job", "namespace"];
const ENV_KEYS: [&str; 4] = ["environment", "env", "tier", "stage"];
const SEVERITY_KEYS: [&str; 3] = ["severity", "priority", "level"];

const EXTRACTED_LABEL_KEYS: [&str; 13] = [
    "alertname", "severity", "priority", "level", "service", "app", "application", "job",
    "namespace", "environment", "env", "tier", "stage",
];

fn labels_from(value: &Value) -> Labels {
    let mut labels = Labels::new();
    if let Some(obj) = value.as_object() {
        for (k, v) in obj {
            if let Some(s) = v.as_str() {
                labels.insert(k.clone(), s.to_string());
            }
        }
    }
    labels
}

fn extract_severity(labels: &Labels) -> Severity {
    for key in SEVERITY_KEYS {
        if let Some(v) = labels.get(key) {
            return Severity::from_alias(v);
        }
    }
    Severity::Warning
}

fn extract_service(labels: &Labels) -> Option<String> {
    SERVICE_KEYS.iter().find_map(|k| labels.get(*k).cloned())
}

fn extract_host(labels: &Labels) -> Option<String> {
    if let Some(instance) = labels.get("instance") {
        if !instance.is_empty() {
            return Some(super::strip_port(instance));
        }
    }
    labels.get("node").or_else(|| labels.get("host")).cloned()
}

fn extract_environment(labels: &Labels) -> Option<String> {
    ENV_KEYS.iter().find_map(|k| labels.get(*k).cloned())
}

pub struct PrometheusNormalizer;

impl Normalizer for PrometheusNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        let Some(alerts) = payload.get("alerts").and_then(Value::as_array) else {
            return false;
        };
        if alerts.is_empty() {
            return false;
        }
        alerts.iter().all(|a| {
            a.get("labels")
                .and_then(Value::as_object)
                .map(|l| l.contains_key("alertname"))
                .unwrap_or(false)
        })
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let external_url = payload.get("externalURL").and_then(Value::as_str);
        let empty = Vec::new();
        let alerts = payload.get("alerts").and_then(Value::as_array).unwrap_or(&empty);

        alerts
            .iter()
            .map(|alert_data| {
                let labels = labels_from(alert_data.get("labels").unwrap_or(&Value::Null));
                let annotations = labels_from(alert_data.get("annotations").unwrap_or(&Value::Null));

                let name = labels.get("alertname").cloned().unwrap_or_else(|| "UnnamedAlert".into());
                let status = alert_data.get("status").and_then(Value::as_str).unwrap_or("firing");
                let severity = extract_severity(&labels);

                let description = super::first_present(
                    &annotations,
                    &["description", "summary", "message"],
                )
                .map(|s| s.to_string());

                let starts_at = super::parse_optional_timestamp(
                    alert_data.get("startsAt").and_then(Value::as_str),
                );
                let ends_at = super::parse_optional_timestamp(
                    alert_data.get("endsAt").and_then(Value::as_str),
                );

                let mut clean_labels = labels.clone();
                for k in EXTRACTED_LABEL_KEYS {
                    clean_labels.shift_remove(k);
                }
                clean_labels.shift_remove("instance");
                clean_labels.shift_remove("node");
                clean_labels.shift_remove("host");

                NormalizedAlert {
                    name,
                    source: "prometheus".into(),
                    source_instance: external_url.map(|s| s.to_string()),
                    severity,
                    status: if status == "firing" { AlertStatus::Firing } else { AlertStatus::Resolved },
                    description,
                    service: extract_service(&labels),
                    environment: extract_environment(&labels),
                    host: extract_host(&labels),
                    labels: clean_labels,
                    annotations,
                    starts_at,
                    ends_at,
                    generator_url: alert_data.get("generatorURL").and_then(Value::as_str).map(|s| s.to_string()),
                    raw_payload: alert_data.clone(),
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        serde_json::json!({
            "externalURL": "http://alertmanager:9093",
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighCPU", "instance": "web-01:9090", "job": "node", "severity": "critical"},
                "annotations": {"summary": "High CPU", "runbook_url": "https://runbooks/cpu"},
                "startsAt": "2024-01-15T10:00:00+00:00",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus:9090/graph"
            }]
        })
    }

    #[test]
    fn validates_alertname_presence() {
        let n = PrometheusNormalizer;
        assert!(n.validate(&sample()));
        assert!(!n.validate(&serde_json::json!({"alerts": [{"labels": {}}]})));
    }

    #[test]
    fn extracts_host_service_and_zero_time_as_unresolved() {
        let n = PrometheusNormalizer;
        let alerts = n.normalize(&sample());
        assert_eq!(alerts.len(), 1);
        let a = &alerts[0];
        assert_eq!(a.host.as_deref(), Some("web-01"));
        assert_eq!(a.service.as_deref(), Some("node"));
        assert_eq!(a.severity, Severity::Critical);
        assert!(a.ends_at.is_none());
        assert!(!a.labels.contains_key("instance"));
        assert!(!a.labels.contains_key("job"));
    }
}
