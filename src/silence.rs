//! Silence / maintenance window matching (C4).

use crate::model::{Alert, SilenceWindow};

/// True if every present clause of `window.matchers` matches the alert.
/// An empty or missing clause matches everything; clauses are AND-combined.
fn matches(window: &SilenceWindow, alert: &Alert) -> bool {
    let m = &window.matchers;

    if !m.service.is_empty() {
        let matches_service = alert
            .service
            .as_deref()
            .map(|s| m.service.iter().any(|v| v == s))
            .unwrap_or(false);
        if !matches_service {
            return false;
        }
    }

    if !m.severity.is_empty() {
        let sev = alert.severity.as_str();
        if !m.severity.iter().any(|v| v == sev) {
            return false;
        }
    }

    if !m.labels.is_empty() {
        for (k, v) in m.labels.iter() {
            if alert.labels.get(k) != Some(v) {
                return false;
            }
        }
    }

    true
}

/// Returns the first active silence window whose matchers subsume the
/// alert, if any.
pub fn check_silence<'a>(windows: &'a [SilenceWindow], alert: &Alert) -> Option<&'a SilenceWindow> {
    windows.iter().find(|w| matches(w, alert))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NormalizedAlert, SilenceMatchers};
    use crate::severity::Severity;
    use chrono::Utc;
    use indexmap::IndexMap;
    use uuid::Uuid;

    fn window(matchers: SilenceMatchers) -> SilenceWindow {
        let now = Utc::now();
        SilenceWindow {
            id: Uuid::new_v4(),
            name: "maint".into(),
            matchers,
            starts_at: now - chrono::Duration::minutes(1),
            ends_at: now + chrono::Duration::hours(1),
            is_active: true,
            created_by: None,
            created_at: now,
        }
    }

    fn alert(service: Option<&str>, severity: Severity, labels: IndexMap<String, String>) -> Alert {
        Alert::from_normalized(
            NormalizedAlert {
                name: "HighCPU".into(),
                source: "generic".into(),
                severity,
                service: service.map(|s| s.to_string()),
                labels,
                ..Default::default()
            },
            "fp".into(),
            Utc::now(),
        )
    }

    #[test]
    fn service_clause_matches() {
        let w = window(SilenceMatchers {
            service: vec!["api".into()],
            severity: vec![],
            labels: IndexMap::new(),
        });
        let a = alert(Some("api"), Severity::Critical, IndexMap::new());
        assert!(matches(&w, &a));
    }

    #[test]
    fn service_clause_excludes_null_service() {
        let w = window(SilenceMatchers {
            service: vec!["api".into()],
            severity: vec![],
            labels: IndexMap::new(),
        });
        let a = alert(None, Severity::Critical, IndexMap::new());
        assert!(!matches(&w, &a));
    }

    #[test]
    fn clauses_are_and_combined() {
        let w = window(SilenceMatchers {
            service: vec!["api".into()],
            severity: vec!["critical".into()],
            labels: IndexMap::new(),
        });
        let a = alert(Some("api"), Severity::Warning, IndexMap::new());
        assert!(!matches(&w, &a));
    }

    #[test]
    fn empty_matchers_match_everything() {
        let w = window(SilenceMatchers {
            service: vec![],
            severity: vec![],
            labels: IndexMap::new(),
        });
        let a = alert(None, Severity::Info, IndexMap::new());
        assert!(matches(&w, &a));
    }

    #[test]
    fn label_clause_requires_literal_match() {
        let mut labels = IndexMap::new();
        labels.insert("team".to_string(), "payments".to_string());
        let w = window(SilenceMatchers {
            service: vec![],
            severity: vec![],
            labels,
        });
        let mut alert_labels = IndexMap::new();
        alert_labels.insert("team".to_string(), "infra".to_string());
        let a = alert(None, Severity::Info, alert_labels);
        assert!(!matches(&w, &a));
    }
}
