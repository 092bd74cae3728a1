//! Provider normalization (C1): map six provider payload shapes into a
//! single internal event shape.

pub mod datadog;
pub mod generic;
pub mod grafana;
pub mod prometheus;
pub mod splunk;
pub mod splunk_email;

use serde_json::Value;

use crate::model::NormalizedAlert;

pub trait Normalizer: Send + Sync {
    /// Cheap shape check that disambiguates this provider from others.
    fn validate(&self, payload: &Value) -> bool;
    /// Parse a validated payload into one or more alerts. Must not panic
    /// on any input a real provider could legitimately send.
    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert>;
}

/// Resolve a provider identifier to its normalizer.
pub fn registry(provider: &str) -> Option<Box<dyn Normalizer>> {
    match provider {
        "generic" => Some(Box::new(generic::GenericNormalizer)),
        "prometheus" => Some(Box::new(prometheus::PrometheusNormalizer)),
        "grafana" => Some(Box::new(grafana::GrafanaNormalizer)),
        "splunk" => Some(Box::new(splunk::SplunkNormalizer)),
        "splunk_email" => Some(Box::new(splunk_email::SplunkEmailNormalizer)),
        "datadog" => Some(Box::new(datadog::DatadogNormalizer)),
        _ => None,
    }
}

/// Shared helper: a `"0001-01-01T00:00:00Z"`-style zero timestamp means
/// "unresolved" across every provider; parse failures degrade to `None`.
pub fn parse_optional_timestamp(raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    let raw = raw?;
    if raw.starts_with("0001-01-01") || raw.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&chrono::Utc))
}

/// Shared helper: strip a trailing `:port` from a Prometheus/Grafana
/// `instance` label to recover a bare hostname.
pub fn strip_port(instance: &str) -> String {
    match instance.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
        _ => instance.to_string(),
    }
}

/// Pull the first present key from a label/annotation map.
pub fn first_present<'a>(map: &'a crate::model::Labels, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| map.get(*k).map(|s| s.as_str()))
}
