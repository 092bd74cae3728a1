//! `{prefix}/alerts…` (spec.md §6): listing with filters, acknowledge/
//! resolve transitions, and notes/tags CRUD.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::{Alert, AlertNote};
use crate::severity::{AlertStatus, Severity};
use crate::store::{AlertFilter, Page, SortOrder};

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/alerts")
        .route("", web::get().to(list))
        .route("/{id}", web::get().to(get))
        .route("/{id}/acknowledge", web::post().to(acknowledge))
        .route("/{id}/resolve", web::post().to(resolve))
        .route("/{id}/notes", web::get().to(list_notes))
        .route("/{id}/notes", web::post().to(add_note))
        .route("/{id}/tags", web::put().to(set_tags))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    severity: Option<String>,
    service: Option<String>,
    q: Option<String>,
    #[serde(default = "default_sort_by")]
    sort_by: String,
    #[serde(default)]
    sort_order: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_sort_by() -> String {
    "created_at".to_string()
}
fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    50
}

const SORTABLE_FIELDS: &[&str] = &[
    "created_at",
    "severity",
    "name",
    "service",
    "status",
    "starts_at",
    "last_received_at",
    "duplicate_count",
];

async fn list(query: web::Query<ListQuery>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let ListQuery { status, severity, service, q, sort_by, sort_order, page, page_size } = query.into_inner();

    if !SORTABLE_FIELDS.contains(&sort_by.as_str()) {
        return Err(AppError::Validation(format!("unsupported sort_by: {sort_by}")));
    }
    let sort_order = match sort_order.as_deref() {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => return Err(AppError::Validation(format!("unsupported sort_order: {other}"))),
    };
    if page < 1 {
        return Err(AppError::Validation("page must be >= 1".into()));
    }
    if !(1..=200).contains(&page_size) {
        return Err(AppError::Validation("page_size must be within [1, 200]".into()));
    }

    let filter = AlertFilter {
        status: parse_filter(status, AlertStatus::parse, "status")?,
        severity: parse_filter(severity, Severity::parse, "severity")?,
        service,
        query: q,
    };

    let (alerts, total) = state.store.list_alerts(filter, &sort_by, sort_order, Page { page, page_size }).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(serde_json::json!({
        "items": alerts,
        "total": total,
        "page": page,
        "page_size": page_size,
    }))))
}

fn parse_filter<T>(raw: Option<String>, parse: impl Fn(&str) -> Option<T>, field: &str) -> Result<Option<T>, AppError> {
    raw.map(|s| parse(&s).ok_or_else(|| AppError::Validation(format!("unsupported {field}: {s}"))))
        .transpose()
}

async fn get(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let alert = find_or_404(&state, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(alert)))
}

#[derive(Debug, Deserialize, Default)]
struct AcknowledgeBody {
    acknowledged_by: Option<String>,
}

async fn acknowledge(
    path: web::Path<Uuid>,
    body: Option<web::Json<AcknowledgeBody>>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let mut alert = find_or_404(&state, path.into_inner()).await?;
    let body = body.map(|b| b.into_inner()).unwrap_or_default();
    alert.status = AlertStatus::Acknowledged;
    alert.acknowledged_at = Some(Utc::now());
    alert.acknowledged_by = body.acknowledged_by;
    let alert = state.store.update_alert(alert).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(alert)))
}

async fn resolve(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let mut alert = find_or_404(&state, path.into_inner()).await?;
    let now = Utc::now();
    alert.status = AlertStatus::Resolved;
    alert.resolved_at = Some(now);
    let alert = state.store.update_alert(alert).await?;

    let window = state.settings.correlation_window();
    if let Some(outcome) = crate::correlation::correlate(&state.store, &alert, window, now).await? {
        if outcome.trigger == crate::correlation::CorrelationTrigger::IncidentResolved {
            crate::notify::dispatch(&state.store, &state.settings, &outcome.incident, crate::model::IncidentEventType::IncidentResolved).await?;
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::new(alert)))
}

async fn list_notes(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let notes = state.store.list_notes(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(notes)))
}

#[derive(Debug, Deserialize)]
struct AddNoteBody {
    body: String,
    author: Option<String>,
}

async fn add_note(
    path: web::Path<Uuid>,
    body: web::Json<AddNoteBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let alert_id = path.into_inner();
    find_or_404(&state, alert_id).await?;
    let body = body.into_inner();
    let note = AlertNote {
        id: Uuid::new_v4(),
        alert_id,
        body: body.body,
        author: body.author,
        created_at: Utc::now(),
    };
    let note = state.store.add_note(note).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(note)))
}

#[derive(Debug, Deserialize)]
struct SetTagsBody {
    tags: Vec<String>,
}

async fn set_tags(
    path: web::Path<Uuid>,
    body: web::Json<SetTagsBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let alert = state.store.set_tags(path.into_inner(), body.into_inner().tags).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(alert)))
}

async fn find_or_404(state: &AppState, id: Uuid) -> Result<Alert, AppError> {
    state
        .store
        .get_alert(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("alert {id} not found")))
}
