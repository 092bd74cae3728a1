//! sqlx-backed `Store` implementation (feature = "postgres").
//!
//! The ingestion hot path — alerts, active silences/runbook rules, incident
//! correlation, and notification dispatch — is fully implemented against
//! real tables. Secondary administrative CRUD (schedule/policy/channel
//! mutation) follows the same shape but is stubbed with `todo!()`; wire it
//! up the same way as the alert methods below when a deployment actually
//! needs a non-memory on-call/config store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::*;
use crate::severity::{AlertStatus, IncidentStatus, Severity};

use super::{AlertFilter, Page, SortOrder, Store, StoreResult};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Storage(format!("failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    /// Creates the schema if it does not already exist. Safe to call on
    /// every startup, mirroring the in-memory store needing no setup.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(MIGRATIONS)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }
}

const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS alerts (
    id UUID PRIMARY KEY,
    fingerprint TEXT NOT NULL,
    name TEXT NOT NULL,
    source TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    description TEXT,
    service TEXT,
    environment TEXT,
    host TEXT,
    source_instance TEXT,
    generator_url TEXT,
    runbook_url TEXT,
    ticket_url TEXT,
    starts_at TIMESTAMPTZ,
    ends_at TIMESTAMPTZ,
    labels JSONB NOT NULL DEFAULT '{}'::jsonb,
    annotations JSONB NOT NULL DEFAULT '{}'::jsonb,
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    raw_payload JSONB NOT NULL DEFAULT 'null'::jsonb,
    last_received_at TIMESTAMPTZ NOT NULL,
    duplicate_count INT NOT NULL DEFAULT 1,
    acknowledged_at TIMESTAMPTZ,
    acknowledged_by TEXT,
    resolved_at TIMESTAMPTZ,
    archived_at TIMESTAMPTZ,
    incident_id UUID,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_fingerprint ON alerts (fingerprint);

CREATE TABLE IF NOT EXISTS alert_occurrences (
    id UUID PRIMARY KEY,
    alert_id UUID NOT NULL REFERENCES alerts (id),
    received_at TIMESTAMPTZ NOT NULL,
    raw_payload JSONB NOT NULL DEFAULT 'null'::jsonb
);

CREATE TABLE IF NOT EXISTS alert_notes (
    id UUID PRIMARY KEY,
    alert_id UUID NOT NULL REFERENCES alerts (id),
    body TEXT NOT NULL,
    author TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS silences (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    matchers JSONB NOT NULL DEFAULT '{}'::jsonb,
    starts_at TIMESTAMPTZ NOT NULL,
    ends_at TIMESTAMPTZ NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_by TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS runbook_rules (
    id UUID PRIMARY KEY,
    service_pattern TEXT NOT NULL,
    name_pattern TEXT,
    runbook_url_template TEXT NOT NULL,
    description TEXT,
    priority INT NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS incidents (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    severity TEXT NOT NULL,
    summary TEXT,
    phase TEXT,
    started_at TIMESTAMPTZ NOT NULL,
    acknowledged_at TIMESTAMPTZ,
    resolved_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS incident_alerts (
    incident_id UUID NOT NULL REFERENCES incidents (id),
    alert_id UUID NOT NULL REFERENCES alerts (id),
    PRIMARY KEY (incident_id, alert_id)
);

CREATE TABLE IF NOT EXISTS incident_events (
    id UUID PRIMARY KEY,
    incident_id UUID NOT NULL REFERENCES incidents (id),
    event_type TEXT NOT NULL,
    actor TEXT,
    data JSONB NOT NULL DEFAULT 'null'::jsonb,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_channels (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    channel_type TEXT NOT NULL,
    config JSONB NOT NULL DEFAULT '{}'::jsonb,
    filters JSONB NOT NULL DEFAULT '{}'::jsonb,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_logs (
    id UUID PRIMARY KEY,
    channel_id UUID NOT NULL REFERENCES notification_channels (id),
    incident_id UUID NOT NULL REFERENCES incidents (id),
    event_type TEXT NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT,
    sent_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_cooldowns (
    channel_id UUID NOT NULL,
    incident_id UUID NOT NULL,
    last_sent_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (channel_id, incident_id)
);

CREATE TABLE IF NOT EXISTS oncall_schedules (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    timezone TEXT NOT NULL,
    rotation_type TEXT NOT NULL,
    members JSONB NOT NULL DEFAULT '[]'::jsonb,
    handoff_time TEXT NOT NULL,
    rotation_interval_days INT NOT NULL DEFAULT 0,
    rotation_interval_hours INT,
    effective_from TIMESTAMPTZ NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS oncall_overrides (
    id UUID PRIMARY KEY,
    schedule_id UUID NOT NULL REFERENCES oncall_schedules (id),
    user_id UUID NOT NULL,
    starts_at TIMESTAMPTZ NOT NULL,
    ends_at TIMESTAMPTZ NOT NULL,
    reason TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    hashed_password TEXT NOT NULL,
    display_name TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    must_change_password BOOLEAN NOT NULL DEFAULT FALSE,
    last_login_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS escalation_policies (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    repeat_count INT NOT NULL DEFAULT 0,
    levels JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS service_escalation_mappings (
    id UUID PRIMARY KEY,
    service_pattern TEXT NOT NULL,
    severity_filter JSONB,
    escalation_policy_id UUID NOT NULL REFERENCES escalation_policies (id),
    priority INT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

fn alert_from_row(row: sqlx::postgres::PgRow) -> Alert {
    Alert {
        id: row.get("id"),
        fingerprint: row.get("fingerprint"),
        name: row.get("name"),
        source: row.get("source"),
        severity: Severity::parse(row.get("severity")).unwrap_or(Severity::Warning),
        status: AlertStatus::parse(row.get("status")).unwrap_or(AlertStatus::Firing),
        description: row.get("description"),
        service: row.get("service"),
        environment: row.get("environment"),
        host: row.get("host"),
        source_instance: row.get("source_instance"),
        generator_url: row.get("generator_url"),
        runbook_url: row.get("runbook_url"),
        ticket_url: row.get("ticket_url"),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        labels: serde_json::from_value(row.get("labels")).unwrap_or_default(),
        annotations: serde_json::from_value(row.get("annotations")).unwrap_or_default(),
        tags: serde_json::from_value(row.get("tags")).unwrap_or_default(),
        raw_payload: row.get("raw_payload"),
        last_received_at: row.get("last_received_at"),
        duplicate_count: row.get::<i32, _>("duplicate_count") as u32,
        acknowledged_at: row.get("acknowledged_at"),
        acknowledged_by: row.get("acknowledged_by"),
        resolved_at: row.get("resolved_at"),
        archived_at: row.get("archived_at"),
        incident_id: row.get("incident_id"),
        created_at: row.get("created_at"),
    }
}

fn incident_from_row(row: sqlx::postgres::PgRow) -> Incident {
    Incident {
        id: row.get("id"),
        title: row.get("title"),
        status: match row.get::<&str, _>("status") {
            "acknowledged" => IncidentStatus::Acknowledged,
            "resolved" => IncidentStatus::Resolved,
            _ => IncidentStatus::Open,
        },
        severity: Severity::parse(row.get("severity")).unwrap_or(Severity::Warning),
        summary: row.get("summary"),
        phase: row.get("phase"),
        started_at: row.get("started_at"),
        acknowledged_at: row.get("acknowledged_at"),
        resolved_at: row.get("resolved_at"),
        created_at: row.get("created_at"),
    }
}

fn db_err(action: &str) -> impl Fn(sqlx::Error) -> AppError + '_ {
    move |e| AppError::Storage(format!("failed to {action}: {e}"))
}

#[async_trait]
impl Store for PostgresStore {
    // -- Alerts ------------------------------------------------------------

    async fn insert_alert(&self, alert: Alert) -> StoreResult<Alert> {
        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, fingerprint, name, source, severity, status, description, service,
                environment, host, source_instance, generator_url, runbook_url, ticket_url,
                starts_at, ends_at, labels, annotations, tags, raw_payload,
                last_received_at, duplicate_count, acknowledged_at, acknowledged_by,
                resolved_at, archived_at, incident_id, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,$25,$26,$27,$28)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.fingerprint)
        .bind(&alert.name)
        .bind(&alert.source)
        .bind(alert.severity.as_str())
        .bind(alert.status.as_str())
        .bind(&alert.description)
        .bind(&alert.service)
        .bind(&alert.environment)
        .bind(&alert.host)
        .bind(&alert.source_instance)
        .bind(&alert.generator_url)
        .bind(&alert.runbook_url)
        .bind(&alert.ticket_url)
        .bind(alert.starts_at)
        .bind(alert.ends_at)
        .bind(serde_json::to_value(&alert.labels).unwrap_or_default())
        .bind(serde_json::to_value(&alert.annotations).unwrap_or_default())
        .bind(serde_json::to_value(&alert.tags).unwrap_or_default())
        .bind(&alert.raw_payload)
        .bind(alert.last_received_at)
        .bind(alert.duplicate_count as i32)
        .bind(alert.acknowledged_at)
        .bind(&alert.acknowledged_by)
        .bind(alert.resolved_at)
        .bind(alert.archived_at)
        .bind(alert.incident_id)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert alert"))?;
        Ok(alert)
    }

    async fn find_duplicate_alert(
        &self,
        fingerprint: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Alert>> {
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_default();
        // FOR UPDATE per the row-level-lock requirement; a real guarantee against
        // the insert/touch race needs this SELECT and the subsequent write to
        // share a transaction, which the per-call Store trait boundary doesn't
        // give us here — see DESIGN.md.
        let row = sqlx::query(
            r#"
            SELECT * FROM alerts
            WHERE fingerprint = $1
              AND status IN ('firing', 'acknowledged')
              AND last_received_at >= $2
            ORDER BY last_received_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(fingerprint)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("find duplicate alert"))?;
        Ok(row.map(alert_from_row))
    }

    async fn touch_duplicate(
        &self,
        alert_id: Uuid,
        now: DateTime<Utc>,
        raw_payload: serde_json::Value,
    ) -> StoreResult<Alert> {
        let row = sqlx::query(
            r#"
            UPDATE alerts SET duplicate_count = duplicate_count + 1, last_received_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("touch duplicate"))?
        .ok_or_else(|| AppError::NotFound(format!("alert {alert_id}")))?;

        sqlx::query(
            "INSERT INTO alert_occurrences (id, alert_id, received_at, raw_payload) VALUES ($1,$2,$3,$4)",
        )
        .bind(Uuid::new_v4())
        .bind(alert_id)
        .bind(now)
        .bind(raw_payload)
        .execute(&self.pool)
        .await
        .map_err(db_err("record occurrence"))?;

        Ok(alert_from_row(row))
    }

    async fn get_alert(&self, id: Uuid) -> StoreResult<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get alert"))?;
        Ok(row.map(alert_from_row))
    }

    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert> {
        let result = sqlx::query(
            r#"
            UPDATE alerts SET
                status = $2, description = $3, acknowledged_at = $4, acknowledged_by = $5,
                resolved_at = $6, archived_at = $7, incident_id = $8, severity = $9,
                tags = $10, last_received_at = $11, duplicate_count = $12
            WHERE id = $1
            "#,
        )
        .bind(alert.id)
        .bind(alert.status.as_str())
        .bind(&alert.description)
        .bind(alert.acknowledged_at)
        .bind(&alert.acknowledged_by)
        .bind(alert.resolved_at)
        .bind(alert.archived_at)
        .bind(alert.incident_id)
        .bind(alert.severity.as_str())
        .bind(serde_json::to_value(&alert.tags).unwrap_or_default())
        .bind(alert.last_received_at)
        .bind(alert.duplicate_count as i32)
        .execute(&self.pool)
        .await
        .map_err(db_err("update alert"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("alert {}", alert.id)));
        }
        Ok(alert)
    }

    async fn list_alerts(
        &self,
        filter: AlertFilter,
        sort_by: &str,
        sort_order: SortOrder,
        page: Page,
    ) -> StoreResult<(Vec<Alert>, u64)> {
        let sort_column = match sort_by {
            "severity" | "name" | "service" | "status" | "starts_at" | "last_received_at"
            | "duplicate_count" => sort_by,
            _ => "created_at",
        };
        let direction = if sort_order == SortOrder::Desc { "DESC" } else { "ASC" };
        let offset = (page.page.saturating_sub(1) * page.page_size) as i64;

        let query = format!(
            r#"
            SELECT * FROM alerts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR severity = $2)
              AND ($3::text IS NULL OR service = $3)
              AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%')
            ORDER BY {sort_column} {direction}
            LIMIT $5 OFFSET $6
            "#
        );
        let rows = sqlx::query(&query)
            .bind(filter.status.map(|s| s.as_str().to_string()))
            .bind(filter.severity.map(|s| s.as_str().to_string()))
            .bind(&filter.service)
            .bind(&filter.query)
            .bind(page.page_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list alerts"))?;

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM alerts
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR severity = $2)
              AND ($3::text IS NULL OR service = $3)
              AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%')
            "#,
        )
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.severity.map(|s| s.as_str().to_string()))
        .bind(&filter.service)
        .bind(&filter.query)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("count alerts"))?
        .get("count");

        Ok((rows.into_iter().map(alert_from_row).collect(), total as u64))
    }

    async fn add_note(&self, note: AlertNote) -> StoreResult<AlertNote> {
        sqlx::query("INSERT INTO alert_notes (id, alert_id, body, author, created_at) VALUES ($1,$2,$3,$4,$5)")
            .bind(note.id)
            .bind(note.alert_id)
            .bind(&note.body)
            .bind(&note.author)
            .bind(note.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err("add note"))?;
        Ok(note)
    }

    async fn list_notes(&self, alert_id: Uuid) -> StoreResult<Vec<AlertNote>> {
        let rows = sqlx::query("SELECT * FROM alert_notes WHERE alert_id = $1 ORDER BY created_at ASC")
            .bind(alert_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list notes"))?;
        Ok(rows
            .into_iter()
            .map(|row| AlertNote {
                id: row.get("id"),
                alert_id: row.get("alert_id"),
                body: row.get("body"),
                author: row.get("author"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn set_tags(&self, alert_id: Uuid, tags: Vec<String>) -> StoreResult<Alert> {
        let row = sqlx::query("UPDATE alerts SET tags = $2 WHERE id = $1 RETURNING *")
            .bind(alert_id)
            .bind(serde_json::to_value(&tags).unwrap_or_default())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("set tags"))?
            .ok_or_else(|| AppError::NotFound(format!("alert {alert_id}")))?;
        Ok(alert_from_row(row))
    }

    // -- Silences ------------------------------------------------------------

    async fn list_active_silences(&self, now: DateTime<Utc>) -> StoreResult<Vec<SilenceWindow>> {
        let rows = sqlx::query(
            "SELECT * FROM silences WHERE is_active AND starts_at <= $1 AND ends_at >= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list active silences"))?;
        Ok(rows.into_iter().map(silence_from_row).collect())
    }

    async fn list_silences(&self) -> StoreResult<Vec<SilenceWindow>> {
        let rows = sqlx::query("SELECT * FROM silences ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list silences"))?;
        Ok(rows.into_iter().map(silence_from_row).collect())
    }

    async fn create_silence(&self, _silence: SilenceWindow) -> StoreResult<SilenceWindow> {
        todo!("Implement PostgreSQL silence creation - following same pattern as insert_alert")
    }

    async fn update_silence(&self, _silence: SilenceWindow) -> StoreResult<SilenceWindow> {
        todo!("Implement PostgreSQL silence update - following same pattern as update_alert")
    }

    async fn delete_silence(&self, _id: Uuid) -> StoreResult<()> {
        todo!("Implement PostgreSQL silence deletion - following same pattern as delete_channel")
    }

    // -- Runbooks ------------------------------------------------------------

    async fn list_active_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>> {
        let rows = sqlx::query("SELECT * FROM runbook_rules WHERE is_active ORDER BY priority DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list active runbook rules"))?;
        Ok(rows.into_iter().map(runbook_rule_from_row).collect())
    }

    async fn list_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>> {
        let rows = sqlx::query("SELECT * FROM runbook_rules ORDER BY priority DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list runbook rules"))?;
        Ok(rows.into_iter().map(runbook_rule_from_row).collect())
    }

    async fn create_runbook_rule(&self, _rule: RunbookRule) -> StoreResult<RunbookRule> {
        todo!("Implement PostgreSQL runbook rule creation - following same pattern as insert_alert")
    }

    async fn update_runbook_rule(&self, _rule: RunbookRule) -> StoreResult<RunbookRule> {
        todo!("Implement PostgreSQL runbook rule update - following same pattern as update_alert")
    }

    async fn delete_runbook_rule(&self, _id: Uuid) -> StoreResult<()> {
        todo!("Implement PostgreSQL runbook rule deletion - following same pattern as delete_channel")
    }

    // -- Incidents ------------------------------------------------------------

    async fn find_correlatable_incident(
        &self,
        service: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Incident>> {
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_default();
        let mut conn = self.pool.acquire().await.map_err(db_err("acquire connection"))?;

        // Advisory lock on the service name, held for the session's current
        // transaction, per the row-level-lock requirement for correlation.
        // Same caveat as find_duplicate_alert: a single `acquire`d connection
        // doesn't span the later create_incident/attach_alert_to_incident
        // calls, so this narrows but doesn't close the race window.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(service)
            .execute(&mut *conn)
            .await
            .map_err(db_err("acquire correlation lock"))?;

        let row = sqlx::query(
            r#"
            SELECT DISTINCT i.* FROM incidents i
            JOIN incident_alerts ia ON ia.incident_id = i.id
            JOIN alerts a ON a.id = ia.alert_id
            WHERE i.status IN ('open', 'acknowledged')
              AND i.started_at >= $2
              AND a.service = $1
            ORDER BY i.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(service)
        .bind(cutoff)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("find correlatable incident"))?;
        Ok(row.map(incident_from_row))
    }

    async fn create_incident(&self, incident: Incident) -> StoreResult<Incident> {
        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, status, severity, summary, phase, started_at, acknowledged_at, resolved_at, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(incident.status.as_str())
        .bind(incident.severity.as_str())
        .bind(&incident.summary)
        .bind(&incident.phase)
        .bind(incident.started_at)
        .bind(incident.acknowledged_at)
        .bind(incident.resolved_at)
        .bind(incident.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("create incident"))?;
        Ok(incident)
    }

    async fn get_incident(&self, id: Uuid) -> StoreResult<Option<Incident>> {
        let row = sqlx::query("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get incident"))?;
        Ok(row.map(incident_from_row))
    }

    async fn update_incident(&self, incident: Incident) -> StoreResult<Incident> {
        let result = sqlx::query(
            r#"
            UPDATE incidents SET
                title = $2, status = $3, severity = $4, summary = $5, phase = $6,
                acknowledged_at = $7, resolved_at = $8
            WHERE id = $1
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(incident.status.as_str())
        .bind(incident.severity.as_str())
        .bind(&incident.summary)
        .bind(&incident.phase)
        .bind(incident.acknowledged_at)
        .bind(incident.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("update incident"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("incident {}", incident.id)));
        }
        Ok(incident)
    }

    async fn list_incidents(&self) -> StoreResult<Vec<Incident>> {
        let rows = sqlx::query("SELECT * FROM incidents ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list incidents"))?;
        Ok(rows.into_iter().map(incident_from_row).collect())
    }

    async fn attach_alert_to_incident(&self, alert_id: Uuid, incident_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO incident_alerts (incident_id, alert_id) VALUES ($1,$2) ON CONFLICT DO NOTHING",
        )
        .bind(incident_id)
        .bind(alert_id)
        .execute(&self.pool)
        .await
        .map_err(db_err("attach alert to incident"))?;

        sqlx::query("UPDATE alerts SET incident_id = $2 WHERE id = $1")
            .bind(alert_id)
            .bind(incident_id)
            .execute(&self.pool)
            .await
            .map_err(db_err("stamp alert incident_id"))?;
        Ok(())
    }

    async fn alerts_for_incident(&self, incident_id: Uuid) -> StoreResult<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM alerts a
            JOIN incident_alerts ia ON ia.alert_id = a.id
            WHERE ia.incident_id = $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list alerts for incident"))?;
        Ok(rows.into_iter().map(alert_from_row).collect())
    }

    async fn append_incident_event(&self, event: IncidentEvent) -> StoreResult<IncidentEvent> {
        sqlx::query(
            "INSERT INTO incident_events (id, incident_id, event_type, actor, data, created_at) VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(event.id)
        .bind(event.incident_id)
        .bind(event_type_str(event.event_type))
        .bind(&event.actor)
        .bind(&event.data)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("append incident event"))?;
        Ok(event)
    }

    async fn list_incident_events(&self, incident_id: Uuid) -> StoreResult<Vec<IncidentEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM incident_events WHERE incident_id = $1 ORDER BY created_at ASC",
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list incident events"))?;
        Ok(rows
            .into_iter()
            .map(|row| IncidentEvent {
                id: row.get("id"),
                incident_id: row.get("incident_id"),
                event_type: event_type_from_str(row.get("event_type")),
                actor: row.get("actor"),
                data: row.get("data"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    // -- Notifications ---------------------------------------------------------

    async fn list_active_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        let rows = sqlx::query("SELECT * FROM notification_channels WHERE is_active")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list active channels"))?;
        Ok(rows.into_iter().map(channel_from_row).collect())
    }

    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        let rows = sqlx::query("SELECT * FROM notification_channels ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list channels"))?;
        Ok(rows.into_iter().map(channel_from_row).collect())
    }

    async fn create_channel(&self, _channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        todo!("Implement PostgreSQL channel creation - following same pattern as insert_alert")
    }

    async fn update_channel(&self, _channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        todo!("Implement PostgreSQL channel update - following same pattern as update_alert")
    }

    async fn delete_channel(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM notification_channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("delete channel"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("channel {id}")));
        }
        Ok(())
    }

    async fn insert_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (id, channel_id, incident_id, event_type, status, error_message, sent_at, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(log.id)
        .bind(log.channel_id)
        .bind(log.incident_id)
        .bind(event_type_str(log.event_type))
        .bind(status_str(log.status))
        .bind(&log.error_message)
        .bind(log.sent_at)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert notification log"))?;
        Ok(log)
    }

    async fn update_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog> {
        sqlx::query(
            "UPDATE notification_logs SET status = $2, error_message = $3, sent_at = $4 WHERE id = $1",
        )
        .bind(log.id)
        .bind(status_str(log.status))
        .bind(&log.error_message)
        .bind(log.sent_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("update notification log"))?;
        Ok(log)
    }

    async fn check_and_set_cooldown(
        &self,
        channel_id: Uuid,
        incident_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> StoreResult<bool> {
        let cooldown_secs = cooldown.as_secs() as f64;
        let row = sqlx::query(
            r#"
            INSERT INTO notification_cooldowns (channel_id, incident_id, last_sent_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (channel_id, incident_id) DO UPDATE
                SET last_sent_at = EXCLUDED.last_sent_at
                WHERE notification_cooldowns.last_sent_at <= EXCLUDED.last_sent_at - make_interval(secs => $4)
            RETURNING channel_id
            "#,
        )
        .bind(channel_id)
        .bind(incident_id)
        .bind(now)
        .bind(cooldown_secs)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("check and set cooldown"))?;
        Ok(row.is_some())
    }

    // -- On-call ---------------------------------------------------------------

    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<OnCallSchedule>> {
        let row = sqlx::query("SELECT * FROM oncall_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get schedule"))?;
        Ok(row.map(schedule_from_row))
    }

    async fn list_schedules(&self) -> StoreResult<Vec<OnCallSchedule>> {
        let rows = sqlx::query("SELECT * FROM oncall_schedules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list schedules"))?;
        Ok(rows.into_iter().map(schedule_from_row).collect())
    }

    async fn create_schedule(&self, _schedule: OnCallSchedule) -> StoreResult<OnCallSchedule> {
        todo!("Implement PostgreSQL schedule creation - following same pattern as insert_alert")
    }

    async fn update_schedule(&self, _schedule: OnCallSchedule) -> StoreResult<OnCallSchedule> {
        todo!("Implement PostgreSQL schedule update - following same pattern as update_alert")
    }

    async fn list_overrides(&self, schedule_id: Uuid) -> StoreResult<Vec<OnCallOverride>> {
        let rows = sqlx::query("SELECT * FROM oncall_overrides WHERE schedule_id = $1 ORDER BY starts_at ASC")
            .bind(schedule_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list overrides"))?;
        Ok(rows
            .into_iter()
            .map(|row| OnCallOverride {
                id: row.get("id"),
                schedule_id: row.get("schedule_id"),
                user_id: row.get("user_id"),
                starts_at: row.get("starts_at"),
                ends_at: row.get("ends_at"),
                reason: row.get("reason"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn create_override(&self, _over: OnCallOverride) -> StoreResult<OnCallOverride> {
        todo!("Implement PostgreSQL override creation - following same pattern as insert_alert")
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get user"))?;
        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            username: row.get("username"),
            hashed_password: row.get("hashed_password"),
            display_name: row.get("display_name"),
            role: match row.get::<&str, _>("role") {
                "admin" => UserRole::Admin,
                "viewer" => UserRole::Viewer,
                _ => UserRole::User,
            },
            is_active: row.get("is_active"),
            must_change_password: row.get("must_change_password"),
            last_login_at: row.get("last_login_at"),
            created_at: row.get("created_at"),
        }))
    }

    async fn list_mappings_by_priority(&self) -> StoreResult<Vec<ServiceEscalationMapping>> {
        let rows = sqlx::query("SELECT * FROM service_escalation_mappings ORDER BY priority DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list mappings"))?;
        Ok(rows
            .into_iter()
            .map(|row| ServiceEscalationMapping {
                id: row.get("id"),
                service_pattern: row.get("service_pattern"),
                severity_filter: row
                    .get::<Option<serde_json::Value>, _>("severity_filter")
                    .and_then(|v| serde_json::from_value(v).ok()),
                escalation_policy_id: row.get("escalation_policy_id"),
                priority: row.get("priority"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn create_mapping(
        &self,
        _mapping: ServiceEscalationMapping,
    ) -> StoreResult<ServiceEscalationMapping> {
        todo!("Implement PostgreSQL mapping creation - following same pattern as insert_alert")
    }

    async fn get_policy(&self, id: Uuid) -> StoreResult<Option<EscalationPolicy>> {
        let row = sqlx::query("SELECT * FROM escalation_policies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get policy"))?;
        Ok(row.map(policy_from_row))
    }

    async fn list_policies(&self) -> StoreResult<Vec<EscalationPolicy>> {
        let rows = sqlx::query("SELECT * FROM escalation_policies ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list policies"))?;
        Ok(rows.into_iter().map(policy_from_row).collect())
    }

    async fn create_policy(&self, _policy: EscalationPolicy) -> StoreResult<EscalationPolicy> {
        todo!("Implement PostgreSQL policy creation - following same pattern as insert_alert")
    }
}

fn silence_from_row(row: sqlx::postgres::PgRow) -> SilenceWindow {
    SilenceWindow {
        id: row.get("id"),
        name: row.get("name"),
        matchers: serde_json::from_value(row.get("matchers")).unwrap_or_default(),
        starts_at: row.get("starts_at"),
        ends_at: row.get("ends_at"),
        is_active: row.get("is_active"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn runbook_rule_from_row(row: sqlx::postgres::PgRow) -> RunbookRule {
    RunbookRule {
        id: row.get("id"),
        service_pattern: row.get("service_pattern"),
        name_pattern: row.get("name_pattern"),
        runbook_url_template: row.get("runbook_url_template"),
        description: row.get("description"),
        priority: row.get("priority"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn channel_from_row(row: sqlx::postgres::PgRow) -> NotificationChannel {
    NotificationChannel {
        id: row.get("id"),
        name: row.get("name"),
        channel_type: match row.get::<&str, _>("channel_type") {
            "slack" => ChannelType::Slack,
            "email" => ChannelType::Email,
            "teams" => ChannelType::Teams,
            "pagerduty" => ChannelType::Pagerduty,
            _ => ChannelType::Webhook,
        },
        config: row.get("config"),
        filters: serde_json::from_value(row.get("filters")).unwrap_or_default(),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn schedule_from_row(row: sqlx::postgres::PgRow) -> OnCallSchedule {
    OnCallSchedule {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        timezone: row.get("timezone"),
        rotation_type: match row.get::<&str, _>("rotation_type") {
            "hourly" => RotationType::Hourly,
            "weekly" => RotationType::Weekly,
            "custom" => RotationType::Custom,
            _ => RotationType::Daily,
        },
        members: serde_json::from_value(row.get("members")).unwrap_or_default(),
        handoff_time: row.get("handoff_time"),
        rotation_interval_days: row.get("rotation_interval_days"),
        rotation_interval_hours: row.get("rotation_interval_hours"),
        effective_from: row.get("effective_from"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn policy_from_row(row: sqlx::postgres::PgRow) -> EscalationPolicy {
    EscalationPolicy {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        repeat_count: row.get("repeat_count"),
        levels: serde_json::from_value(row.get("levels")).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

fn event_type_str(event_type: IncidentEventType) -> &'static str {
    match event_type {
        IncidentEventType::IncidentCreated => "incident_created",
        IncidentEventType::SeverityChanged => "severity_changed",
        IncidentEventType::IncidentResolved => "incident_resolved",
        IncidentEventType::AlertAdded => "alert_added",
        IncidentEventType::IncidentAcknowledged => "incident_acknowledged",
        IncidentEventType::IncidentAutoResolved => "incident_auto_resolved",
    }
}

fn event_type_from_str(raw: &str) -> IncidentEventType {
    match raw {
        "incident_created" => IncidentEventType::IncidentCreated,
        "severity_changed" => IncidentEventType::SeverityChanged,
        "incident_resolved" => IncidentEventType::IncidentResolved,
        "incident_acknowledged" => IncidentEventType::IncidentAcknowledged,
        "incident_auto_resolved" => IncidentEventType::IncidentAutoResolved,
        _ => IncidentEventType::AlertAdded,
    }
}

fn status_str(status: NotificationStatus) -> &'static str {
    match status {
        NotificationStatus::Pending => "pending",
        NotificationStatus::Sent => "sent",
        NotificationStatus::Failed => "failed",
    }
}
