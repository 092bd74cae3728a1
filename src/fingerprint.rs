//! Stable identity hashing for alerts (C2).
//!
//! Deterministic and label-key-order independent; severity, description,
//! and annotations never influence the output.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::model::{Labels, NormalizedAlert};

const VOLATILE_LABEL_KEYS: [&str; 5] =
    ["timestamp", "value", "description", "summary", "generatorURL"];

pub struct FingerprintInput<'a> {
    pub source: &'a str,
    pub name: &'a str,
    pub service: Option<&'a str>,
    pub host: Option<&'a str>,
    pub labels: Option<&'a Labels>,
}

impl<'a> FingerprintInput<'a> {
    pub fn from_normalized(alert: &'a NormalizedAlert) -> Self {
        Self {
            source: &alert.source,
            name: &alert.name,
            service: alert.service.as_deref(),
            host: alert.host.as_deref(),
            labels: Some(&alert.labels),
        }
    }
}

/// Compute the 16-hex-character identity hash.
pub fn fingerprint(input: &FingerprintInput) -> String {
    let mut identity = Map::new();
    identity.insert("source".to_string(), json!(input.source));
    identity.insert("name".to_string(), json!(input.name));
    identity.insert("service".to_string(), json!(input.service.unwrap_or("")));
    identity.insert("host".to_string(), json!(input.host.unwrap_or("")));

    if let Some(labels) = input.labels {
        if !labels.is_empty() {
            let mut filtered: Vec<(&String, &String)> = labels
                .iter()
                .filter(|(k, _)| !VOLATILE_LABEL_KEYS.contains(&k.as_str()))
                .collect();
            filtered.sort_by(|a, b| a.0.cmp(b.0));
            let mut label_map = Map::new();
            for (k, v) in filtered {
                label_map.insert(k.clone(), json!(v));
            }
            if !label_map.is_empty() {
                identity.insert("labels".to_string(), Value::Object(label_map));
            }
        }
    }

    let canonical = canonical_json(&Value::Object(identity));
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Render JSON with lexicographically sorted object keys and no whitespace.
/// `serde_json::Map` does not guarantee key order across platforms unless
/// its `preserve_order` feature is disabled, so keys are sorted explicitly.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", canonical_json(&json!(k)), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::{AlertStatus, Severity};

    fn base_alert() -> NormalizedAlert {
        NormalizedAlert {
            name: "HighCPU".into(),
            source: "generic".into(),
            severity: Severity::Critical,
            status: AlertStatus::Firing,
            service: Some("api".into()),
            host: Some("web-01".into()),
            ..Default::default()
        }
    }

    #[test]
    fn deterministic_and_length_16() {
        let alert = base_alert();
        let fp1 = fingerprint(&FingerprintInput::from_normalized(&alert));
        let fp2 = fingerprint(&FingerprintInput::from_normalized(&alert));
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 16);
    }

    #[test]
    fn label_order_independent() {
        let mut a = base_alert();
        a.labels.insert("zone".into(), "us-east".into());
        a.labels.insert("pod".into(), "a1".into());

        let mut b = base_alert();
        b.labels.insert("pod".into(), "a1".into());
        b.labels.insert("zone".into(), "us-east".into());

        assert_eq!(
            fingerprint(&FingerprintInput::from_normalized(&a)),
            fingerprint(&FingerprintInput::from_normalized(&b))
        );
    }

    #[test]
    fn severity_and_description_do_not_affect_fingerprint() {
        let mut a = base_alert();
        a.severity = Severity::Info;
        a.description = Some("first".into());

        let mut b = base_alert();
        b.severity = Severity::Critical;
        b.description = Some("second".into());

        assert_eq!(
            fingerprint(&FingerprintInput::from_normalized(&a)),
            fingerprint(&FingerprintInput::from_normalized(&b))
        );
    }

    #[test]
    fn volatile_labels_are_excluded() {
        let mut a = base_alert();
        a.labels.insert("timestamp".into(), "123".into());

        let b = base_alert();

        assert_eq!(
            fingerprint(&FingerprintInput::from_normalized(&a)),
            fingerprint(&FingerprintInput::from_normalized(&b))
        );
    }

    #[test]
    fn different_service_changes_fingerprint() {
        let a = base_alert();
        let mut b = base_alert();
        b.service = Some("web".into());

        assert_ne!(
            fingerprint(&FingerprintInput::from_normalized(&a)),
            fingerprint(&FingerprintInput::from_normalized(&b))
        );
    }
}
