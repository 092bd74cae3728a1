//! HTTP/WebSocket surface (interface boundary, spec.md §6).
//!
//! Thin actix-web handlers over the `Store`/`EventSink` capabilities built
//! up by the rest of the crate — request parsing and response shaping
//! only, no business logic lives here.

pub mod alerts;
pub mod channels;
pub mod incidents;
pub mod oncall_routes;
pub mod runbooks_routes;
pub mod silences;
pub mod webhooks;
pub mod ws;

use std::sync::Arc;

use actix_web::web::{self, ServiceConfig};
use serde::Serialize;

use crate::config::Settings;
use crate::events::EventSink;
use crate::store::Store;

/// Shared application state, registered once as `actix_web::web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub events: Arc<dyn EventSink>,
    pub settings: Arc<Settings>,
}

/// Common success envelope. Errors go through `AppError`'s own
/// `ResponseError` impl (`{"detail": "…"}`), so this only wraps the happy
/// path.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Wire every route under `settings.api_prefix`. Split out from
/// `main.rs`'s server bootstrap so integration tests can build the same
/// `App` against an in-memory store.
pub fn configure(cfg: &mut ServiceConfig, prefix: &str) {
    cfg.service(
        web::scope(prefix)
            .route("/health", web::get().to(health))
            .service(webhooks::scope())
            .service(alerts::scope())
            .service(incidents::scope())
            .service(silences::scope())
            .service(channels::scope())
            .service(oncall_routes::scope())
            .service(runbooks_routes::scope())
            .route("/ws", web::get().to(ws::handshake)),
    );
}

pub(crate) fn default_true() -> bool {
    true
}

async fn health() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(ApiResponse::new(serde_json::json!({"status": "ok"})))
}
