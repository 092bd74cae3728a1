//! Persistence interface boundary.
//!
//! Every core component (dedup, silence, correlation, notification,
//! on-call) reads and writes domain state exclusively through the `Store`
//! trait. This keeps the pipeline oblivious to which backend sits behind
//! it — an in-process map for tests and single-node deployments, or a real
//! database for everything else.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::*;
use crate::severity::AlertStatus;

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<crate::severity::Severity>,
    pub service: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

pub type StoreResult<T> = Result<T, AppError>;

/// Configuration shared by every backend implementation.
///
/// Mirrors the env-var-driven settings struct pattern used throughout the
/// pipeline's `config.rs`: sane defaults, validated once at startup.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    #[allow(dead_code)]
    Postgres { database_url: String, pool_size: u32 },
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Postgres { database_url, .. } => {
                if database_url.is_empty() {
                    Err("database_url must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // -- Alerts ----------------------------------------------------------
    async fn insert_alert(&self, alert: Alert) -> StoreResult<Alert>;
    async fn find_duplicate_alert(
        &self,
        fingerprint: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Alert>>;
    async fn touch_duplicate(
        &self,
        alert_id: Uuid,
        now: DateTime<Utc>,
        raw_payload: serde_json::Value,
    ) -> StoreResult<Alert>;
    async fn get_alert(&self, id: Uuid) -> StoreResult<Option<Alert>>;
    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert>;
    async fn list_alerts(
        &self,
        filter: AlertFilter,
        sort_by: &str,
        sort_order: SortOrder,
        page: Page,
    ) -> StoreResult<(Vec<Alert>, u64)>;
    async fn add_note(&self, note: AlertNote) -> StoreResult<AlertNote>;
    async fn list_notes(&self, alert_id: Uuid) -> StoreResult<Vec<AlertNote>>;
    async fn set_tags(&self, alert_id: Uuid, tags: Vec<String>) -> StoreResult<Alert>;

    // -- Silences ----------------------------------------------------------
    async fn list_active_silences(&self, now: DateTime<Utc>) -> StoreResult<Vec<SilenceWindow>>;
    async fn list_silences(&self) -> StoreResult<Vec<SilenceWindow>>;
    async fn create_silence(&self, silence: SilenceWindow) -> StoreResult<SilenceWindow>;
    async fn update_silence(&self, silence: SilenceWindow) -> StoreResult<SilenceWindow>;
    async fn delete_silence(&self, id: Uuid) -> StoreResult<()>;

    // -- Runbooks ----------------------------------------------------------
    async fn list_active_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>>;
    async fn list_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>>;
    async fn create_runbook_rule(&self, rule: RunbookRule) -> StoreResult<RunbookRule>;
    async fn update_runbook_rule(&self, rule: RunbookRule) -> StoreResult<RunbookRule>;
    async fn delete_runbook_rule(&self, id: Uuid) -> StoreResult<()>;

    // -- Incidents ----------------------------------------------------------
    async fn find_correlatable_incident(
        &self,
        service: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Incident>>;
    async fn create_incident(&self, incident: Incident) -> StoreResult<Incident>;
    async fn get_incident(&self, id: Uuid) -> StoreResult<Option<Incident>>;
    async fn update_incident(&self, incident: Incident) -> StoreResult<Incident>;
    async fn list_incidents(&self) -> StoreResult<Vec<Incident>>;
    async fn attach_alert_to_incident(&self, alert_id: Uuid, incident_id: Uuid) -> StoreResult<()>;
    async fn alerts_for_incident(&self, incident_id: Uuid) -> StoreResult<Vec<Alert>>;
    async fn append_incident_event(&self, event: IncidentEvent) -> StoreResult<IncidentEvent>;
    async fn list_incident_events(&self, incident_id: Uuid) -> StoreResult<Vec<IncidentEvent>>;

    // -- Notifications -------------------------------------------------------
    async fn list_active_channels(&self) -> StoreResult<Vec<NotificationChannel>>;
    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>>;
    async fn create_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel>;
    async fn update_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel>;
    async fn delete_channel(&self, id: Uuid) -> StoreResult<()>;
    async fn insert_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog>;
    async fn update_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog>;
    /// Atomic check-and-set: true if this call is the one allowed to send
    /// (i.e. the cooldown had elapsed or no prior send was recorded).
    async fn check_and_set_cooldown(
        &self,
        channel_id: Uuid,
        incident_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> StoreResult<bool>;

    // -- On-call -------------------------------------------------------------
    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<OnCallSchedule>>;
    async fn list_schedules(&self) -> StoreResult<Vec<OnCallSchedule>>;
    async fn create_schedule(&self, schedule: OnCallSchedule) -> StoreResult<OnCallSchedule>;
    async fn update_schedule(&self, schedule: OnCallSchedule) -> StoreResult<OnCallSchedule>;
    async fn list_overrides(&self, schedule_id: Uuid) -> StoreResult<Vec<OnCallOverride>>;
    async fn create_override(&self, over: OnCallOverride) -> StoreResult<OnCallOverride>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn list_mappings_by_priority(&self) -> StoreResult<Vec<ServiceEscalationMapping>>;
    async fn create_mapping(
        &self,
        mapping: ServiceEscalationMapping,
    ) -> StoreResult<ServiceEscalationMapping>;
    async fn get_policy(&self, id: Uuid) -> StoreResult<Option<EscalationPolicy>>;
    async fn list_policies(&self) -> StoreResult<Vec<EscalationPolicy>>;
    async fn create_policy(&self, policy: EscalationPolicy) -> StoreResult<EscalationPolicy>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_always_valid() {
        assert!(StoreConfig::Memory.validate().is_ok());
    }

    #[test]
    fn postgres_config_requires_url() {
        let cfg = StoreConfig::Postgres {
            database_url: String::new(),
            pool_size: 10,
        };
        assert!(cfg.validate().is_err());
    }
}
