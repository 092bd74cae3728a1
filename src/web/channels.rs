//! `{prefix}/notifications/channels…` (spec.md §6): thin CRUD over
//! outbound notification channels.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::{ChannelFilters, ChannelType, NotificationChannel};

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/notifications/channels")
        .route("", web::get().to(list))
        .route("", web::post().to(create))
        .route("/{id}", web::put().to(update))
        .route("/{id}", web::delete().to(delete))
}

async fn list(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let channels = state.store.list_channels().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(channels)))
}

#[derive(Debug, Deserialize)]
struct ChannelBody {
    name: String,
    channel_type: ChannelType,
    config: serde_json::Value,
    #[serde(default)]
    filters: ChannelFilters,
    #[serde(default = "super::default_true")]
    is_active: bool,
}

async fn create(body: web::Json<ChannelBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let channel = NotificationChannel {
        id: Uuid::new_v4(),
        name: body.name,
        channel_type: body.channel_type,
        config: body.config,
        filters: body.filters,
        is_active: body.is_active,
        created_at: Utc::now(),
    };
    let channel = state.store.create_channel(channel).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(channel)))
}

async fn update(
    path: web::Path<Uuid>,
    body: web::Json<ChannelBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .store
        .list_channels()
        .await?
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| AppError::NotFound(format!("channel {id} not found")))?;
    let body = body.into_inner();
    let channel = NotificationChannel {
        id,
        name: body.name,
        channel_type: body.channel_type,
        config: body.config,
        filters: body.filters,
        is_active: body.is_active,
        created_at: existing.created_at,
    };
    let channel = state.store.update_channel(channel).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(channel)))
}

async fn delete(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    state.store.delete_channel(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
