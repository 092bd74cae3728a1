//! Deduplication (C3): collapse repeated firings of the same fingerprint
//! within a configurable window.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::model::Alert;
use crate::store::Store;

pub enum DedupOutcome {
    New,
    Duplicate(Alert),
}

/// Look for an active alert with the same fingerprint inside `window`; if
/// found, bump its counter and append an occurrence row. A duplicate hit
/// short-circuits the rest of the ingestion pipeline.
pub async fn process(
    store: &Arc<dyn Store>,
    fingerprint: &str,
    window: Duration,
    now: DateTime<Utc>,
    raw_payload: serde_json::Value,
) -> Result<DedupOutcome, AppError> {
    match store.find_duplicate_alert(fingerprint, window, now).await? {
        Some(existing) => {
            let updated = store.touch_duplicate(existing.id, now, raw_payload).await?;
            Ok(DedupOutcome::Duplicate(updated))
        }
        None => Ok(DedupOutcome::New),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedAlert;
    use crate::severity::Severity;
    use crate::store::memory::MemoryStore;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn second_receipt_within_window_is_a_duplicate_with_count_two() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");
        let alert = Alert::from_normalized(
            NormalizedAlert {
                name: "HighCPU".into(),
                source: "generic".into(),
                severity: Severity::Critical,
                ..Default::default()
            },
            "fp1".into(),
            t0,
        );
        store.insert_alert(alert.clone()).await.unwrap();

        let t1 = t0 + chrono::Duration::seconds(10);
        let outcome = process(&store, "fp1", Duration::from_secs(300), t1, serde_json::json!({}))
            .await
            .unwrap();

        match outcome {
            DedupOutcome::Duplicate(a) => assert_eq!(a.duplicate_count, 2),
            DedupOutcome::New => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn receipt_outside_window_is_new() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let t0 = t("2025-01-01T00:00:00Z");
        let alert = Alert::from_normalized(
            NormalizedAlert {
                name: "HighCPU".into(),
                source: "generic".into(),
                ..Default::default()
            },
            "fp1".into(),
            t0,
        );
        store.insert_alert(alert).await.unwrap();

        let t1 = t0 + chrono::Duration::seconds(400);
        let outcome = process(&store, "fp1", Duration::from_secs(300), t1, serde_json::json!({}))
            .await
            .unwrap();
        assert!(matches!(outcome, DedupOutcome::New));
    }
}
