//! `{prefix}/incidents…` (spec.md §6): thin CRUD plus the acknowledge
//! transition and the per-incident event/alert sub-resources.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::{Incident, IncidentEvent, IncidentEventType};
use crate::severity::IncidentStatus;

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/incidents")
        .route("", web::get().to(list))
        .route("/{id}", web::get().to(get))
        .route("/{id}", web::put().to(update))
        .route("/{id}/acknowledge", web::post().to(acknowledge))
        .route("/{id}/alerts", web::get().to(alerts))
        .route("/{id}/events", web::get().to(events))
}

async fn list(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let incidents = state.store.list_incidents().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(incidents)))
}

async fn get(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let incident = find_or_404(&state, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(incident)))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    title: Option<String>,
    summary: Option<String>,
    phase: Option<String>,
}

async fn update(
    path: web::Path<Uuid>,
    body: web::Json<UpdateBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let mut incident = find_or_404(&state, path.into_inner()).await?;
    let body = body.into_inner();
    if let Some(title) = body.title {
        incident.title = title;
    }
    if body.summary.is_some() {
        incident.summary = body.summary;
    }
    if body.phase.is_some() {
        incident.phase = body.phase;
    }
    let incident = state.store.update_incident(incident).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(incident)))
}

async fn acknowledge(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let mut incident = find_or_404(&state, path.into_inner()).await?;
    let now = Utc::now();
    incident.status = IncidentStatus::Acknowledged;
    incident.acknowledged_at = Some(now);
    let incident = state.store.update_incident(incident.clone()).await?;
    state
        .store
        .append_incident_event(IncidentEvent {
            id: Uuid::new_v4(),
            incident_id: incident.id,
            event_type: IncidentEventType::IncidentAcknowledged,
            actor: None,
            data: serde_json::json!({}),
            created_at: now,
        })
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(incident)))
}

async fn alerts(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let incident_id = path.into_inner();
    find_or_404(&state, incident_id).await?;
    let alerts = state.store.alerts_for_incident(incident_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(alerts)))
}

async fn events(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let incident_id = path.into_inner();
    find_or_404(&state, incident_id).await?;
    let events = state.store.list_incident_events(incident_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(events)))
}

async fn find_or_404(state: &AppState, id: Uuid) -> Result<Incident, AppError> {
    state
        .store
        .get_incident(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("incident {id} not found")))
}
