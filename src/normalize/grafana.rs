//! Grafana Unified Alerting webhook normalizer.

use serde_json::Value;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::{AlertStatus, Severity};

use super::Normalizer;

const GRAFANA_SPECIFIC_FIELDS: [&str; 4] = ["dashboardURL", "panelURL", "silenceURL", "valueString"];
const EXTRACTED_LABEL_KEYS: [&str; 10] = [
    "alertname", "severity", "priority", "level", "service", "app", "application",
    "environment", "env", "tier",
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
    for key in ["severity", "priority", "level"] {
        if let Some(v) = labels.get(key) {
            return Severity::from_alias(v);
        }
    }
    Severity::Warning
}

pub struct GrafanaNormalizer;

impl Normalizer for GrafanaNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        let Some(alerts) = payload.get("alerts").and_then(Value::as_array) else {
            return false;
        };
        if alerts.is_empty() {
            return false;
        }
        let shape_ok = alerts.iter().all(|a| {
            a.get("labels")
                .and_then(Value::as_object)
                .map(|l| l.contains_key("alertname"))
                .unwrap_or(false)
        });
        if !shape_ok {
            return false;
        }

        let has_top_level = ["state", "title", "message"]
            .iter()
            .any(|k| payload.get(*k).and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false));
        let has_grafana_fields = alerts
            .iter()
            .any(|a| GRAFANA_SPECIFIC_FIELDS.iter().any(|k| a.get(*k).is_some()));

        has_top_level || has_grafana_fields
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let external_url = payload.get("externalURL").and_then(Value::as_str);
        let empty = Vec::new();
        let alerts = payload.get("alerts").and_then(Value::as_array).unwrap_or(&empty);

        alerts
            .iter()
            .map(|alert_data| {
                let labels = labels_from(alert_data.get("labels").unwrap_or(&Value::Null));
                let mut annotations = labels_from(alert_data.get("annotations").unwrap_or(&Value::Null));

                let name = labels.get("alertname").cloned().unwrap_or_else(|| "UnnamedAlert".into());
                let status = alert_data.get("status").and_then(Value::as_str).unwrap_or("firing");
                let severity = extract_severity(&labels);

                let description = super::first_present(&annotations, &["description", "summary", "message"])
                    .map(|s| s.to_string());

                let starts_at = super::parse_optional_timestamp(alert_data.get("startsAt").and_then(Value::as_str));
                let ends_at = super::parse_optional_timestamp(alert_data.get("endsAt").and_then(Value::as_str));

                let generator_url = alert_data
                    .get("dashboardURL")
                    .or_else(|| alert_data.get("panelURL"))
                    .or_else(|| alert_data.get("generatorURL"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_string());

                let mut clean_labels = labels.clone();
                for k in EXTRACTED_LABEL_KEYS {
                    clean_labels.shift_remove(k);
                }
                clean_labels.shift_remove("job");
                clean_labels.shift_remove("namespace");
                clean_labels.shift_remove("instance");
                clean_labels.shift_remove("node");
                clean_labels.shift_remove("host");
                clean_labels.shift_remove("stage");

                if let Some(vs) = alert_data.get("valueString").and_then(Value::as_str) {
                    annotations.insert("valueString".into(), vs.to_string());
                }

                NormalizedAlert {
                    name,
                    source: "grafana".into(),
                    source_instance: external_url.map(|s| s.to_string()),
                    severity,
                    status: if status == "firing" { AlertStatus::Firing } else { AlertStatus::Resolved },
                    description,
                    service: super::first_present(&labels, &["service", "app", "application", "job", "namespace"])
                        .map(|s| s.to_string()),
                    environment: super::first_present(&labels, &["environment", "env", "tier", "stage"])
                        .map(|s| s.to_string()),
                    host: labels
                        .get("instance")
                        .filter(|s| !s.is_empty())
                        .map(|s| super::strip_port(s))
                        .or_else(|| labels.get("node").or_else(|| labels.get("host")).cloned()),
                    labels: clean_labels,
                    annotations,
                    starts_at,
                    ends_at,
                    generator_url,
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
            "state": "alerting",
            "externalURL": "http://grafana:3000/",
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighCPU", "severity": "critical"},
                "annotations": {"summary": "CPU is high"},
                "startsAt": "2024-01-15T10:00:00+00:00",
                "endsAt": "0001-01-01T00:00:00Z",
                "dashboardURL": "http://grafana:3000/d/abc",
                "valueString": "value=95.3"
            }]
        })
    }

    #[test]
    fn validates_grafana_specific_shape() {
        let n = GrafanaNormalizer;
        assert!(n.validate(&sample()));
        let prometheus_like = serde_json::json!({
            "alerts": [{"labels": {"alertname": "X"}}]
        });
        assert!(!n.validate(&prometheus_like));
    }

    #[test]
    fn prefers_dashboard_url_and_includes_value_string() {
        let n = GrafanaNormalizer;
        let alerts = n.normalize(&sample());
        assert_eq!(alerts[0].generator_url.as_deref(), Some("http://grafana:3000/d/abc"));
        assert_eq!(alerts[0].annotations.get("valueString").map(|s| s.as_str()), Some("value=95.3"));
    }
}
