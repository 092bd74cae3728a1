//! `{prefix}/silences…` (spec.md §6): thin CRUD over maintenance windows.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::{SilenceMatchers, SilenceWindow};

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/silences")
        .route("", web::get().to(list))
        .route("", web::post().to(create))
        .route("/{id}", web::put().to(update))
        .route("/{id}", web::delete().to(delete))
}

async fn list(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let silences = state.store.list_silences().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(silences)))
}

#[derive(Debug, Deserialize)]
struct SilenceBody {
    name: String,
    #[serde(default)]
    matchers: SilenceMatchers,
    starts_at: chrono::DateTime<Utc>,
    ends_at: chrono::DateTime<Utc>,
    created_by: Option<String>,
}

fn validate_window(starts_at: chrono::DateTime<Utc>, ends_at: chrono::DateTime<Utc>) -> Result<(), AppError> {
    if ends_at <= starts_at {
        return Err(AppError::Conflict("ends_at must be after starts_at".into()));
    }
    Ok(())
}

async fn create(body: web::Json<SilenceBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    validate_window(body.starts_at, body.ends_at)?;
    let silence = SilenceWindow {
        id: Uuid::new_v4(),
        name: body.name,
        matchers: body.matchers,
        starts_at: body.starts_at,
        ends_at: body.ends_at,
        is_active: true,
        created_by: body.created_by,
        created_at: Utc::now(),
    };
    let silence = state.store.create_silence(silence).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(silence)))
}

async fn update(
    path: web::Path<Uuid>,
    body: web::Json<SilenceBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .store
        .list_silences()
        .await?
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("silence {id} not found")))?;
    let body = body.into_inner();
    validate_window(body.starts_at, body.ends_at)?;
    let silence = SilenceWindow {
        id,
        name: body.name,
        matchers: body.matchers,
        starts_at: body.starts_at,
        ends_at: body.ends_at,
        is_active: existing.is_active,
        created_by: existing.created_by,
        created_at: existing.created_at,
    };
    let silence = state.store.update_silence(silence).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(silence)))
}

async fn delete(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    state.store.delete_silence(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
