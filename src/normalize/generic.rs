//! Generic webhook normalizer: direct field-for-field mapping from the
//! documented envelope. This is the default, easiest integration path.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::{AlertStatus, Severity};

use super::Normalizer;

#[derive(Debug, Deserialize)]
struct GenericWebhookPayload {
    name: String,
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(default = "default_status")]
    status: String,
    description: Option<String>,
    service: Option<String>,
    environment: Option<String>,
    host: Option<String>,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    annotations: Labels,
    #[serde(default)]
    tags: Vec<String>,
    source_instance: Option<String>,
    starts_at: Option<String>,
    ends_at: Option<String>,
    generator_url: Option<String>,
}

fn default_source() -> String {
    "generic".into()
}
fn default_severity() -> String {
    "warning".into()
}
fn default_status() -> String {
    "firing".into()
}

pub struct GenericNormalizer;

impl Normalizer for GenericNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        serde_json::from_value::<GenericWebhookPayload>(payload.clone()).is_ok()
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let data: GenericWebhookPayload = match serde_json::from_value(payload.clone()) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };

        let status = if data.status.eq_ignore_ascii_case("resolved") {
            AlertStatus::Resolved
        } else {
            AlertStatus::Firing
        };

        vec![NormalizedAlert {
            name: data.name,
            source: data.source,
            severity: Severity::from_alias(&data.severity),
            status,
            description: data.description,
            service: data.service,
            environment: data.environment,
            host: data.host,
            source_instance: data.source_instance,
            generator_url: data.generator_url,
            starts_at: super::parse_optional_timestamp(data.starts_at.as_deref()),
            ends_at: super::parse_optional_timestamp(data.ends_at.as_deref()),
            labels: data.labels,
            annotations: data.annotations,
            tags: data.tags,
            raw_payload: payload.clone(),
            ..Default::default()
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_payload() {
        let payload = serde_json::json!({
            "name": "HighCPU",
            "severity": "critical",
            "service": "api",
            "host": "web-01"
        });
        let n = GenericNormalizer;
        assert!(n.validate(&payload));
        let alerts = n.normalize(&payload);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].status, AlertStatus::Firing);
    }

    #[test]
    fn rejects_missing_name() {
        let payload = serde_json::json!({"severity": "critical"});
        let n = GenericNormalizer;
        assert!(!n.validate(&payload));
    }
}
