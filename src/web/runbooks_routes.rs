//! `{prefix}/runbooks/rules…` (spec.md §6): thin CRUD over runbook
//! resolution rules.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::RunbookRule;

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/runbooks/rules")
        .route("", web::get().to(list))
        .route("", web::post().to(create))
        .route("/{id}", web::put().to(update))
        .route("/{id}", web::delete().to(delete))
}

async fn list(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(state.store.list_runbook_rules().await?)))
}

#[derive(Debug, Deserialize)]
struct RuleBody {
    service_pattern: String,
    name_pattern: Option<String>,
    runbook_url_template: String,
    description: Option<String>,
    #[serde(default)]
    priority: i32,
    #[serde(default = "super::default_true")]
    is_active: bool,
}

async fn create(body: web::Json<RuleBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let rule = RunbookRule {
        id: Uuid::new_v4(),
        service_pattern: body.service_pattern,
        name_pattern: body.name_pattern,
        runbook_url_template: body.runbook_url_template,
        description: body.description,
        priority: body.priority,
        is_active: body.is_active,
        created_at: Utc::now(),
    };
    let rule = state.store.create_runbook_rule(rule).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(rule)))
}

async fn update(
    path: web::Path<Uuid>,
    body: web::Json<RuleBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .store
        .list_runbook_rules()
        .await?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| AppError::NotFound(format!("runbook rule {id} not found")))?;
    let body = body.into_inner();
    let rule = RunbookRule {
        id,
        service_pattern: body.service_pattern,
        name_pattern: body.name_pattern,
        runbook_url_template: body.runbook_url_template,
        description: body.description,
        priority: body.priority,
        is_active: body.is_active,
        created_at: existing.created_at,
    };
    let rule = state.store.update_runbook_rule(rule).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(rule)))
}

async fn delete(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    state.store.delete_runbook_rule(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
