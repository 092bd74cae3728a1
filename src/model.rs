//! Persistent and transient record types, per the data model.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::severity::{AlertStatus, IncidentStatus, Severity};

pub type Labels = IndexMap<String, String>;

/// Transient shape produced by a normalizer; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAlert {
    pub name: String,
    pub source: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub description: Option<String>,
    pub service: Option<String>,
    pub environment: Option<String>,
    pub host: Option<String>,
    pub source_instance: Option<String>,
    pub generator_url: Option<String>,
    pub runbook_url: Option<String>,
    pub ticket_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    #[serde(default)]
    pub tags: Vec<String>,
    pub raw_payload: Value,
}

impl Default for NormalizedAlert {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: String::new(),
            severity: Severity::Warning,
            status: AlertStatus::Firing,
            description: None,
            service: None,
            environment: None,
            host: None,
            source_instance: None,
            generator_url: None,
            runbook_url: None,
            ticket_url: None,
            starts_at: None,
            ends_at: None,
            labels: Labels::new(),
            annotations: Labels::new(),
            tags: Vec::new(),
            raw_payload: Value::Null,
        }
    }
}

/// Persistent alert record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub fingerprint: String,
    pub name: String,
    pub source: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub description: Option<String>,
    pub service: Option<String>,
    pub environment: Option<String>,
    pub host: Option<String>,
    pub source_instance: Option<String>,
    pub generator_url: Option<String>,
    pub runbook_url: Option<String>,
    pub ticket_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub labels: Labels,
    pub annotations: Labels,
    pub tags: Vec<String>,
    pub raw_payload: Value,

    pub last_received_at: DateTime<Utc>,
    pub duplicate_count: u32,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub incident_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn from_normalized(n: NormalizedAlert, fingerprint: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            name: n.name,
            source: n.source,
            severity: n.severity,
            status: n.status,
            description: n.description,
            service: n.service,
            environment: n.environment,
            host: n.host,
            source_instance: n.source_instance,
            generator_url: n.generator_url,
            runbook_url: n.runbook_url,
            ticket_url: n.ticket_url,
            starts_at: n.starts_at,
            ends_at: n.ends_at,
            labels: n.labels,
            annotations: n.annotations,
            tags: n.tags,
            raw_payload: n.raw_payload,
            last_received_at: now,
            duplicate_count: 1,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            archived_at: None,
            incident_id: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertOccurrence {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub raw_payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNote {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentEventType {
    IncidentCreated,
    AlertAdded,
    SeverityChanged,
    IncidentAcknowledged,
    IncidentResolved,
    IncidentAutoResolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub event_type: IncidentEventType,
    pub actor: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub summary: Option<String>,
    pub phase: Option<String>,
    pub started_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SilenceMatchers {
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub severity: Vec<String>,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceWindow {
    pub id: Uuid,
    pub name: String,
    pub matchers: SilenceMatchers,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SilenceWindow {
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Slack,
    Email,
    Teams,
    Webhook,
    Pagerduty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelFilters {
    #[serde(default)]
    pub severity: Vec<String>,
    #[serde(default)]
    pub service: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: Uuid,
    pub name: String,
    pub channel_type: ChannelType,
    pub config: Value,
    pub filters: ChannelFilters,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub incident_id: Uuid,
    pub event_type: IncidentEventType,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationType {
    Hourly,
    Daily,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCallMember {
    pub user_id: Uuid,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCallSchedule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub timezone: String,
    pub rotation_type: RotationType,
    pub members: Vec<OnCallMember>,
    pub handoff_time: String,
    pub rotation_interval_days: i32,
    pub rotation_interval_hours: Option<i32>,
    pub effective_from: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCallOverride {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub user_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OnCallOverride {
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationTargetType {
    Schedule,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTarget {
    #[serde(rename = "type")]
    pub target_type: EscalationTargetType,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationLevel {
    pub level: i32,
    pub targets: Vec<EscalationTarget>,
    pub timeout_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub repeat_count: i32,
    pub levels: Vec<EscalationLevel>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEscalationMapping {
    pub id: Uuid,
    pub service_pattern: String,
    pub severity_filter: Option<Vec<Severity>>,
    pub escalation_policy_id: Uuid,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunbookRule {
    pub id: Uuid,
    pub service_pattern: String,
    pub name_pattern: Option<String>,
    pub runbook_url_template: String,
    pub description: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Viewer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
