//! `{prefix}/oncall/…` (spec.md §6): schedules, overrides, escalation
//! policies, and service-to-policy mappings.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use actix_web::{web, HttpResponse, Scope};

use crate::auth::ApiKeyGuard;
use crate::error::AppError;
use crate::model::{EscalationLevel, EscalationPolicy, OnCallMember, OnCallOverride, OnCallSchedule, RotationType, ServiceEscalationMapping};
use crate::oncall;
use crate::severity::Severity;

use super::{ApiResponse, AppState};

pub fn scope() -> Scope {
    web::scope("/oncall")
        .route("/schedules", web::get().to(list_schedules))
        .route("/schedules", web::post().to(create_schedule))
        .route("/schedules/{id}", web::put().to(update_schedule))
        .route("/schedules/{id}/current", web::get().to(current_oncall))
        .route("/schedules/{id}/overrides", web::get().to(list_overrides))
        .route("/schedules/{id}/overrides", web::post().to(create_override))
        .route("/policies", web::get().to(list_policies))
        .route("/policies", web::post().to(create_policy))
        .route("/mappings", web::get().to(list_mappings))
        .route("/mappings", web::post().to(create_mapping))
}

async fn list_schedules(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(state.store.list_schedules().await?)))
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    name: String,
    description: Option<String>,
    timezone: String,
    rotation_type: RotationType,
    members: Vec<OnCallMember>,
    #[serde(default = "default_handoff_time")]
    handoff_time: String,
    #[serde(default = "default_rotation_days")]
    rotation_interval_days: i32,
    rotation_interval_hours: Option<i32>,
    effective_from: chrono::DateTime<Utc>,
    #[serde(default = "super::default_true")]
    is_active: bool,
}

fn default_handoff_time() -> String {
    "09:00".to_string()
}
fn default_rotation_days() -> i32 {
    7
}

async fn create_schedule(body: web::Json<ScheduleBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let schedule = OnCallSchedule {
        id: Uuid::new_v4(),
        name: body.name,
        description: body.description,
        timezone: body.timezone,
        rotation_type: body.rotation_type,
        members: body.members,
        handoff_time: body.handoff_time,
        rotation_interval_days: body.rotation_interval_days,
        rotation_interval_hours: body.rotation_interval_hours,
        effective_from: body.effective_from,
        is_active: body.is_active,
        created_at: Utc::now(),
    };
    let schedule = state.store.create_schedule(schedule).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(schedule)))
}

async fn update_schedule(
    path: web::Path<Uuid>,
    body: web::Json<ScheduleBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .store
        .get_schedule(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("schedule {id} not found")))?;
    let body = body.into_inner();
    let schedule = OnCallSchedule {
        id,
        name: body.name,
        description: body.description,
        timezone: body.timezone,
        rotation_type: body.rotation_type,
        members: body.members,
        handoff_time: body.handoff_time,
        rotation_interval_days: body.rotation_interval_days,
        rotation_interval_hours: body.rotation_interval_hours,
        effective_from: body.effective_from,
        is_active: body.is_active,
        created_at: existing.created_at,
    };
    let schedule = state.store.update_schedule(schedule).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(schedule)))
}

async fn current_oncall(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let user_id = oncall::get_current_oncall(&state.store, path.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(serde_json::json!({ "user_id": user_id }))))
}

async fn list_overrides(path: web::Path<Uuid>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(state.store.list_overrides(path.into_inner()).await?)))
}

#[derive(Debug, Deserialize)]
struct OverrideBody {
    user_id: Uuid,
    starts_at: chrono::DateTime<Utc>,
    ends_at: chrono::DateTime<Utc>,
    reason: Option<String>,
}

async fn create_override(
    path: web::Path<Uuid>,
    body: web::Json<OverrideBody>,
    state: web::Data<AppState>,
    _auth: ApiKeyGuard,
) -> Result<HttpResponse, AppError> {
    let schedule_id = path.into_inner();
    let body = body.into_inner();
    if body.ends_at <= body.starts_at {
        return Err(AppError::Conflict("ends_at must be after starts_at".into()));
    }
    let over = OnCallOverride {
        id: Uuid::new_v4(),
        schedule_id,
        user_id: body.user_id,
        starts_at: body.starts_at,
        ends_at: body.ends_at,
        reason: body.reason,
        created_at: Utc::now(),
    };
    let over = state.store.create_override(over).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(over)))
}

async fn list_policies(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(state.store.list_policies().await?)))
}

#[derive(Debug, Deserialize)]
struct PolicyBody {
    name: String,
    description: Option<String>,
    #[serde(default = "default_repeat_count")]
    repeat_count: i32,
    levels: Vec<EscalationLevel>,
}

fn default_repeat_count() -> i32 {
    1
}

async fn create_policy(body: web::Json<PolicyBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let policy = EscalationPolicy {
        id: Uuid::new_v4(),
        name: body.name,
        description: body.description,
        repeat_count: body.repeat_count,
        levels: body.levels,
        created_at: Utc::now(),
    };
    let policy = state.store.create_policy(policy).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(policy)))
}

async fn list_mappings(state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::new(state.store.list_mappings_by_priority().await?)))
}

#[derive(Debug, Deserialize)]
struct MappingBody {
    service_pattern: String,
    severity_filter: Option<Vec<Severity>>,
    escalation_policy_id: Uuid,
    #[serde(default)]
    priority: i32,
}

async fn create_mapping(body: web::Json<MappingBody>, state: web::Data<AppState>, _auth: ApiKeyGuard) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let mapping = ServiceEscalationMapping {
        id: Uuid::new_v4(),
        service_pattern: body.service_pattern,
        severity_filter: body.severity_filter,
        escalation_policy_id: body.escalation_policy_id,
        priority: body.priority,
        created_at: Utc::now(),
    };
    let mapping = state.store.create_mapping(mapping).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(mapping)))
}
