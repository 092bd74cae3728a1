//! End-to-end coverage of the ingestion coordinator (`solace::ingest::ingest`)
//! against the scenarios in spec.md §8. The individual steps (dedup,
//! silence matching, correlation, cooldown) already have focused unit
//! tests alongside their modules; these exercise the full normalize →
//! dedup → silence → persist → correlate → notify → emit chain together.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use solace::config::Settings;
use solace::events::{EventSink, NullSink};
use solace::ingest;
use solace::model::{SilenceMatchers, SilenceWindow};
use solace::severity::AlertStatus;
use solace::store::memory::MemoryStore;
use solace::store::Store;

fn settings() -> Settings {
    Settings {
        app_env: "test".into(),
        dedup_window_seconds: 300,
        correlation_window_seconds: 600,
        notification_cooldown_seconds: 300,
        ..Settings::from_env()
    }
}

fn store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

fn sink() -> Arc<dyn EventSink> {
    Arc::new(NullSink)
}

fn generic_alert(name: &str, severity: &str, service: &str, host: &str) -> serde_json::Value {
    json!({
        "name": name,
        "severity": severity,
        "service": service,
        "host": host,
    })
}

// S1 — dedup window: same fingerprint twice within 10s yields one alert
// row, duplicate_count bumped to 2 on the second response.
#[tokio::test]
async fn s1_dedup_window_collapses_repeat_receipts() {
    let store = store();
    let sink = sink();
    let settings = settings();
    let payload = generic_alert("HighCPU", "critical", "api", "web-01");

    let first = ingest::ingest(&store, &sink, &settings, "generic", payload.clone())
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].is_duplicate);
    assert_eq!(first[0].alert.duplicate_count, 1);

    let second = ingest::ingest(&store, &sink, &settings, "generic", payload)
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert!(second[0].is_duplicate);
    assert_eq!(second[0].alert.duplicate_count, 2);
    assert_eq!(second[0].alert.id, first[0].alert.id);

    let (alerts, total) = store
        .list_alerts(Default::default(), "created_at", solace::store::SortOrder::Asc, solace::store::Page::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(alerts.len(), 1);
}

// S2 — two distinct alerts, same service, inside the correlation window
// fold into a single incident with max(severity).
#[tokio::test]
async fn s2_alerts_on_same_service_correlate_into_one_incident() {
    let store = store();
    let sink = sink();
    let settings = settings();

    let first = ingest::ingest(
        &store,
        &sink,
        &settings,
        "generic",
        generic_alert("HighCPU", "warning", "api", "web-01"),
    )
    .await
    .unwrap();
    let incident_id = first[0].incident_id.expect("first alert opens an incident");

    let second = ingest::ingest(
        &store,
        &sink,
        &settings,
        "generic",
        generic_alert("HighMemory", "critical", "api", "web-02"),
    )
    .await
    .unwrap();
    assert_eq!(second[0].incident_id, Some(incident_id));

    let incident = store.get_incident(incident_id).await.unwrap().unwrap();
    assert_eq!(incident.severity, solace::severity::Severity::Critical);

    let members = store.alerts_for_incident(incident_id).await.unwrap();
    assert_eq!(members.len(), 2);
}

// S4 — an active silence covering the alert's service suppresses it:
// status=suppressed, no incident, the silence check runs before
// correlation so no incident row is ever created.
#[tokio::test]
async fn s4_active_silence_suppresses_matching_alert() {
    let store = store();
    let sink = sink();
    let settings = settings();
    let now: DateTime<Utc> = Utc::now();

    store
        .create_silence(SilenceWindow {
            id: Uuid::new_v4(),
            name: "api maintenance".into(),
            matchers: SilenceMatchers {
                service: vec!["api".into()],
                ..Default::default()
            },
            starts_at: now - chrono::Duration::minutes(1),
            ends_at: now + chrono::Duration::hours(1),
            is_active: true,
            created_by: None,
            created_at: now,
        })
        .await
        .unwrap();

    let outcomes = ingest::ingest(
        &store,
        &sink,
        &settings,
        "generic",
        generic_alert("HighCPU", "critical", "api", "web-01"),
    )
    .await
    .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].alert.status, AlertStatus::Suppressed);
    assert!(outcomes[0].incident_id.is_none());
    assert!(store.list_incidents().await.unwrap().is_empty());
}

// §6: unknown provider is a 400-class validation error, not a panic.
#[tokio::test]
async fn unknown_provider_is_rejected() {
    let store = store();
    let sink = sink();
    let settings = settings();

    let err = ingest::ingest(&store, &sink, &settings, "not-a-real-provider", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, solace::AppError::Validation(_)));
}

// §6: a payload that doesn't match the provider's schema is a validation
// error (422-class), surfaced before anything is persisted.
#[tokio::test]
async fn malformed_payload_is_rejected_before_persisting() {
    let store = store();
    let sink = sink();
    let settings = settings();

    let err = ingest::ingest(&store, &sink, &settings, "generic", json!({"severity": "critical"}))
        .await
        .unwrap_err();
    assert!(matches!(err, solace::AppError::Validation(_)));
    assert!(store.list_incidents().await.unwrap().is_empty());
}
