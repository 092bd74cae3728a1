//! Real-time event sink.
//!
//! The Python original threads `emit_event` back into services via a late
//! import to dodge a circular dependency on the WebSocket router. Here the
//! coordinator instead depends on an injected one-method capability, so the
//! correlation/ingestion core never references the web layer directly.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    #[serde(rename = "alert.created")]
    AlertCreated(Value),
    #[serde(rename = "alert.updated")]
    AlertUpdated(Value),
    #[serde(rename = "incident.created")]
    IncidentCreated(Value),
    #[serde(rename = "incident.updated")]
    IncidentUpdated(Value),
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// No-op sink for tests and deployments without the WebSocket layer.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: DomainEvent) {}
}
