//! `POST {prefix}/webhooks/{provider}` (spec.md §6) — the only route that
//! requires an API key but not a bearer token, since monitoring systems
//! can't complete a login flow.

use actix_web::{web, HttpResponse, Scope};
use serde_json::json;

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::ingest;

use super::AppState;

pub fn scope() -> Scope {
    web::scope("/webhooks").route("/{provider}", web::post().to(receive))
}

async fn receive(
    path: web::Path<String>,
    payload: web::Json<serde_json::Value>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let provider = path.into_inner();
    let outcomes = ingest::ingest(&state.store, &state.events, &state.settings, &provider, payload.into_inner()).await?;

    // A batch-extracting provider (e.g. Prometheus) may yield several
    // alerts from one webhook call; the wire contract describes a single
    // accepted alert, so report the first and let the rest show up via
    // `GET {prefix}/alerts`.
    let first = outcomes
        .first()
        .ok_or_else(|| AppError::Validation("normalizer extracted zero alerts".into()))?;

    Ok(HttpResponse::Accepted().json(json!({
        "status": "accepted",
        "alert_id": first.alert.id,
        "fingerprint": first.alert.fingerprint,
        "is_duplicate": first.is_duplicate,
        "duplicate_count": first.alert.duplicate_count,
        "incident_id": first.incident_id,
    })))
}
