//! Splunk-over-email normalizer: saved searches configured to alert by
//! email land here instead of the webhook action. The body carries an
//! HTML results table (or, for text-only mail clients, a delimited plain
//! text table); every row becomes its own alert, unlike the webhook path
//! which only ever sees the first row.

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Labels, NormalizedAlert};
use crate::severity::AlertStatus;

use super::splunk::{
    build_labels, extract_from_result, extract_severity, DESCRIPTION_FIELD_KEYS, ENV_FIELD_KEYS,
    HOST_FIELD_KEYS, SERVICE_FIELD_KEYS, SEVERITY_FIELD_KEYS,
};
use super::Normalizer;

#[derive(Debug, Deserialize)]
struct EmailPayload {
    subject: String,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    body_text: Option<String>,
}

/// `"Splunk Alert: Disk space low"` / `"[Splunk] Disk space low"` -> the
/// saved search name, falling back to the raw subject line.
fn extract_search_name(subject: &str) -> String {
    let trimmed = subject.trim();
    for prefix in ["Splunk Alert:", "Splunk Alert-", "Splunk Alert–"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    if let Some(start) = trimmed.find("[Splunk]") {
        let rest = trimmed[start + "[Splunk]".len()..].trim();
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    "Splunk Email Alert".to_string()
}

/// One table, represented as a list of row objects keyed by header.
type ParsedTable = Vec<Value>;

/// Parse every `<table>` in the HTML body into row objects, keyed by the
/// first row's cell text (whether that row used `<th>` or `<td>`).
fn parse_html_tables(html: &str) -> Vec<ParsedTable> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th,td").unwrap();

    let mut tables = Vec::new();
    for table_el in document.select(&table_sel) {
        let mut headers: Option<Vec<String>> = None;
        let mut rows: ParsedTable = Vec::new();

        for row_el in table_el.select(&row_sel) {
            let cells: Vec<String> = row_el
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            if headers.is_none() {
                headers = Some(cells);
                continue;
            }
            let headers = headers.as_ref().unwrap();
            let mut obj = serde_json::Map::new();
            for (i, h) in headers.iter().enumerate() {
                if let Some(v) = cells.get(i) {
                    obj.insert(h.clone(), Value::String(v.clone()));
                }
            }
            rows.push(Value::Object(obj));
        }

        if !rows.is_empty() {
            tables.push(rows);
        }
    }
    tables
}

/// Fallback for plain-text mail: tab-delimited, then pipe-delimited,
/// skipping `---`/`===` separator lines.
fn parse_plain_text_table(text: &str) -> ParsedTable {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.chars().all(|c| c == '-' || c == '=' || c == ' '))
        .collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    for delim in ['\t', '|'] {
        let split = |line: &str| -> Vec<String> {
            line.split(delim).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
        };
        let headers = split(lines[0]);
        if headers.len() < 2 {
            continue;
        }
        let mut rows = Vec::new();
        for line in &lines[1..] {
            let cells = split(line);
            if cells.is_empty() {
                continue;
            }
            let mut obj = serde_json::Map::new();
            for (i, h) in headers.iter().enumerate() {
                if let Some(v) = cells.get(i) {
                    obj.insert(h.clone(), Value::String(v.clone()));
                }
            }
            rows.push(Value::Object(obj));
        }
        if !rows.is_empty() {
            return rows;
        }
    }
    Vec::new()
}

fn derive_service_from_log_path(text: &str) -> Option<String> {
    let re = regex::Regex::new(r"/([^/]+)/logs?/").ok()?;
    re.captures(text).map(|c| c[1].to_string())
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

pub struct SplunkEmailNormalizer;

impl Normalizer for SplunkEmailNormalizer {
    fn validate(&self, payload: &Value) -> bool {
        let has_subject = payload.get("subject").and_then(Value::as_str).is_some();
        let has_body = payload.get("body_html").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false)
            || payload.get("body_text").and_then(Value::as_str).map(|s| !s.is_empty()).unwrap_or(false);
        has_subject && has_body
    }

    fn normalize(&self, payload: &Value) -> Vec<NormalizedAlert> {
        let data: EmailPayload = match serde_json::from_value(payload.clone()) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };
        let search_name = extract_search_name(&data.subject);

        let rows: ParsedTable = data
            .body_html
            .as_deref()
            .map(parse_html_tables)
            .filter(|tables| !tables.is_empty())
            .and_then(|tables| tables.into_iter().max_by_key(|t| t.len()))
            .or_else(|| data.body_text.as_deref().map(parse_plain_text_table))
            .unwrap_or_default();

        let extracted = all_extracted_keys();

        if rows.is_empty() {
            let synthetic_body = data.body_text.clone().or_else(|| data.body_html.clone()).unwrap_or_default();
            return vec![NormalizedAlert {
                name: search_name,
                source: "splunk_email".into(),
                status: AlertStatus::Firing,
                description: Some(synthetic_body),
                raw_payload: payload.clone(),
                ..Default::default()
            }];
        }

        rows.iter()
            .map(|row| {
                let severity = extract_severity(row);
                let host = extract_from_result(row, &HOST_FIELD_KEYS);
                let service = extract_from_result(row, &SERVICE_FIELD_KEYS).or_else(|| {
                    row.as_object()
                        .and_then(|o| o.values().find_map(|v| v.as_str()))
                        .and_then(derive_service_from_log_path)
                });
                let environment = extract_from_result(row, &ENV_FIELD_KEYS);
                let mut description = extract_from_result(row, &DESCRIPTION_FIELD_KEYS);

                if description.as_deref().map(|d| d.len() <= 10).unwrap_or(true) {
                    let raw = row.get("_raw").and_then(Value::as_str);
                    let latest_error = row.get("latest_error").and_then(Value::as_str);
                    if let Some(err) = latest_error.filter(|s| !s.trim().is_empty()) {
                        description = Some(err.to_string());
                    } else if let Some(raw) = raw {
                        if description.as_deref().map(|d| raw.len() > d.len()).unwrap_or(!raw.is_empty()) {
                            description = Some(raw.chars().take(500).collect());
                        }
                    }
                }

                let mut labels: Labels = build_labels(row, &extracted);
                labels.shift_remove("_raw");

                NormalizedAlert {
                    name: search_name.clone(),
                    source: "splunk_email".into(),
                    severity,
                    status: AlertStatus::Firing,
                    description,
                    service,
                    environment,
                    host,
                    labels,
                    raw_payload: row.clone(),
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_subject_and_body_presence() {
        let n = SplunkEmailNormalizer;
        assert!(n.validate(&serde_json::json!({"subject": "x", "body_text": "y"})));
        assert!(!n.validate(&serde_json::json!({"subject": "x"})));
    }

    #[test]
    fn parses_html_table_into_one_alert_per_row() {
        let html = r#"
            <html><body>
            <table>
                <tr><th>host</th><th>severity</th><th>message</th></tr>
                <tr><td>web-01</td><td>high</td><td>disk full</td></tr>
                <tr><td>web-02</td><td>critical</td><td>disk full</td></tr>
            </table>
            </body></html>
        "#;
        let payload = serde_json::json!({
            "subject": "Splunk Alert: Disk space low",
            "body_html": html
        });
        let n = SplunkEmailNormalizer;
        assert!(n.validate(&payload));
        let alerts = n.normalize(&payload);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].name, "Disk space low");
        assert_eq!(alerts[0].host.as_deref(), Some("web-01"));
        assert_eq!(alerts[1].host.as_deref(), Some("web-02"));
    }

    #[test]
    fn falls_back_to_plain_text_table_when_no_html() {
        let text = "host\tseverity\tmessage\nweb-03\twarning\thigh latency\n";
        let payload = serde_json::json!({
            "subject": "[Splunk] Latency alert",
            "body_text": text
        });
        let n = SplunkEmailNormalizer;
        let alerts = n.normalize(&payload);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].host.as_deref(), Some("web-03"));
    }

    #[test]
    fn falls_back_to_synthetic_alert_when_no_table_found() {
        let payload = serde_json::json!({
            "subject": "Splunk Alert: No data",
            "body_text": "No results were returned by this search."
        });
        let n = SplunkEmailNormalizer;
        let alerts = n.normalize(&payload);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].description.as_deref(), Some("No results were returned by this search."));
    }
}
