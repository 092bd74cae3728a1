//! In-process `Store` implementation backed by `dashmap`, matching the
//! teacher's concurrency stack (`dashmap` + `parking_lot`). Used by tests
//! and by single-node deployments that don't need Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::*;
use crate::severity::AlertStatus;

use super::{AlertFilter, Page, SortOrder, Store, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    alerts: DashMap<Uuid, Alert>,
    occurrences: DashMap<Uuid, Vec<AlertOccurrence>>,
    notes: DashMap<Uuid, Vec<AlertNote>>,
    silences: DashMap<Uuid, SilenceWindow>,
    runbook_rules: DashMap<Uuid, RunbookRule>,
    incidents: DashMap<Uuid, Incident>,
    incident_alerts: DashMap<Uuid, Vec<Uuid>>,
    incident_events: DashMap<Uuid, Vec<IncidentEvent>>,
    channels: DashMap<Uuid, NotificationChannel>,
    notification_logs: DashMap<Uuid, NotificationLog>,
    cooldowns: DashMap<(Uuid, Uuid), DateTime<Utc>>,
    schedules: DashMap<Uuid, OnCallSchedule>,
    overrides: DashMap<Uuid, Vec<OnCallOverride>>,
    users: DashMap<Uuid, User>,
    mappings: DashMap<Uuid, ServiceEscalationMapping>,
    policies: DashMap<Uuid, EscalationPolicy>,
    insert_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/bootstrap helper: register a user directly.
    pub fn seed_user(&self, user: User) {
        self.users.insert(user.id, user);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_alert(&self, alert: Alert) -> StoreResult<Alert> {
        let _guard = self.insert_lock.lock();
        self.occurrences.insert(
            alert.id,
            vec![AlertOccurrence {
                id: Uuid::new_v4(),
                alert_id: alert.id,
                received_at: alert.created_at,
                raw_payload: alert.raw_payload.clone(),
            }],
        );
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn find_duplicate_alert(
        &self,
        fingerprint: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Alert>> {
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_default();
        let mut candidates: Vec<Alert> = self
            .alerts
            .iter()
            .map(|e| e.value().clone())
            .filter(|a| {
                a.fingerprint == fingerprint
                    && matches!(a.status, AlertStatus::Firing | AlertStatus::Acknowledged)
                    && a.last_received_at >= cutoff
            })
            .collect();
        candidates.sort_by_key(|a| std::cmp::Reverse(a.last_received_at));
        Ok(candidates.into_iter().next())
    }

    async fn touch_duplicate(
        &self,
        alert_id: Uuid,
        now: DateTime<Utc>,
        raw_payload: serde_json::Value,
    ) -> StoreResult<Alert> {
        let mut entry = self
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| AppError::NotFound(format!("alert {alert_id}")))?;
        entry.duplicate_count += 1;
        entry.last_received_at = now;
        let updated = entry.clone();
        drop(entry);
        self.occurrences.entry(alert_id).or_default().push(AlertOccurrence {
            id: Uuid::new_v4(),
            alert_id,
            received_at: now,
            raw_payload,
        });
        Ok(updated)
    }

    async fn get_alert(&self, id: Uuid) -> StoreResult<Option<Alert>> {
        Ok(self.alerts.get(&id).map(|e| e.clone()))
    }

    async fn update_alert(&self, alert: Alert) -> StoreResult<Alert> {
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn list_alerts(
        &self,
        filter: AlertFilter,
        sort_by: &str,
        sort_order: SortOrder,
        page: Page,
    ) -> StoreResult<(Vec<Alert>, u64)> {
        let mut items: Vec<Alert> = self
            .alerts
            .iter()
            .map(|e| e.value().clone())
            .filter(|a| filter.status.map(|s| s == a.status).unwrap_or(true))
            .filter(|a| filter.severity.map(|s| s == a.severity).unwrap_or(true))
            .filter(|a| {
                filter
                    .service
                    .as_ref()
                    .map(|s| a.service.as_deref() == Some(s.as_str()))
                    .unwrap_or(true)
            })
            .filter(|a| {
                filter
                    .query
                    .as_ref()
                    .map(|q| a.name.to_lowercase().contains(&q.to_lowercase()))
                    .unwrap_or(true)
            })
            .collect();

        items.sort_by(|a, b| {
            let ord = match sort_by {
                "severity" => a.severity.cmp(&b.severity),
                "name" => a.name.cmp(&b.name),
                "service" => a.service.cmp(&b.service),
                "status" => format!("{:?}", a.status).cmp(&format!("{:?}", b.status)),
                "starts_at" => a.starts_at.cmp(&b.starts_at),
                "last_received_at" => a.last_received_at.cmp(&b.last_received_at),
                "duplicate_count" => a.duplicate_count.cmp(&b.duplicate_count),
                _ => a.created_at.cmp(&b.created_at),
            };
            if sort_order == SortOrder::Desc {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = items.len() as u64;
        let start = ((page.page.max(1) - 1) * page.page_size) as usize;
        let end = (start + page.page_size as usize).min(items.len());
        let page_items = if start < items.len() {
            items[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok((page_items, total))
    }

    async fn add_note(&self, note: AlertNote) -> StoreResult<AlertNote> {
        self.notes.entry(note.alert_id).or_default().insert(0, note.clone());
        Ok(note)
    }

    async fn list_notes(&self, alert_id: Uuid) -> StoreResult<Vec<AlertNote>> {
        Ok(self.notes.get(&alert_id).map(|e| e.clone()).unwrap_or_default())
    }

    async fn set_tags(&self, alert_id: Uuid, tags: Vec<String>) -> StoreResult<Alert> {
        let mut entry = self
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| AppError::NotFound(format!("alert {alert_id}")))?;
        let mut deduped = Vec::new();
        for t in tags {
            if !deduped.contains(&t) {
                deduped.push(t);
            }
        }
        entry.tags = deduped;
        Ok(entry.clone())
    }

    async fn list_active_silences(&self, now: DateTime<Utc>) -> StoreResult<Vec<SilenceWindow>> {
        Ok(self
            .silences
            .iter()
            .map(|e| e.value().clone())
            .filter(|s| s.is_currently_active(now))
            .collect())
    }

    async fn list_silences(&self) -> StoreResult<Vec<SilenceWindow>> {
        Ok(self.silences.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_silence(&self, silence: SilenceWindow) -> StoreResult<SilenceWindow> {
        self.silences.insert(silence.id, silence.clone());
        Ok(silence)
    }

    async fn update_silence(&self, silence: SilenceWindow) -> StoreResult<SilenceWindow> {
        self.silences.insert(silence.id, silence.clone());
        Ok(silence)
    }

    async fn delete_silence(&self, id: Uuid) -> StoreResult<()> {
        self.silences.remove(&id);
        Ok(())
    }

    async fn list_active_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>> {
        let mut rules: Vec<RunbookRule> = self
            .runbook_rules
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.is_active)
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(rules)
    }

    async fn list_runbook_rules(&self) -> StoreResult<Vec<RunbookRule>> {
        Ok(self.runbook_rules.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_runbook_rule(&self, rule: RunbookRule) -> StoreResult<RunbookRule> {
        self.runbook_rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update_runbook_rule(&self, rule: RunbookRule) -> StoreResult<RunbookRule> {
        self.runbook_rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn delete_runbook_rule(&self, id: Uuid) -> StoreResult<()> {
        self.runbook_rules.remove(&id);
        Ok(())
    }

    async fn find_correlatable_incident(
        &self,
        service: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Incident>> {
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or_default();
        let mut candidates: Vec<Incident> = self
            .incidents
            .iter()
            .map(|e| e.value().clone())
            .filter(|i| {
                matches!(
                    i.status,
                    crate::severity::IncidentStatus::Open | crate::severity::IncidentStatus::Acknowledged
                ) && i.started_at >= cutoff
            })
            .filter(|i| {
                self.incident_alerts
                    .get(&i.id)
                    .map(|ids| {
                        ids.iter().any(|aid| {
                            self.alerts
                                .get(aid)
                                .map(|a| a.service.as_deref() == Some(service))
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort_by_key(|i| std::cmp::Reverse(i.started_at));
        Ok(candidates.into_iter().next())
    }

    async fn create_incident(&self, incident: Incident) -> StoreResult<Incident> {
        self.incidents.insert(incident.id, incident.clone());
        self.incident_alerts.insert(incident.id, Vec::new());
        Ok(incident)
    }

    async fn get_incident(&self, id: Uuid) -> StoreResult<Option<Incident>> {
        Ok(self.incidents.get(&id).map(|e| e.clone()))
    }

    async fn update_incident(&self, incident: Incident) -> StoreResult<Incident> {
        self.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn list_incidents(&self) -> StoreResult<Vec<Incident>> {
        Ok(self.incidents.iter().map(|e| e.value().clone()).collect())
    }

    async fn attach_alert_to_incident(&self, alert_id: Uuid, incident_id: Uuid) -> StoreResult<()> {
        self.incident_alerts.entry(incident_id).or_default().push(alert_id);
        if let Some(mut alert) = self.alerts.get_mut(&alert_id) {
            alert.incident_id = Some(incident_id);
        }
        Ok(())
    }

    async fn alerts_for_incident(&self, incident_id: Uuid) -> StoreResult<Vec<Alert>> {
        let ids = self.incident_alerts.get(&incident_id).map(|e| e.clone()).unwrap_or_default();
        Ok(ids.into_iter().filter_map(|id| self.alerts.get(&id).map(|e| e.clone())).collect())
    }

    async fn append_incident_event(&self, event: IncidentEvent) -> StoreResult<IncidentEvent> {
        self.incident_events.entry(event.incident_id).or_default().push(event.clone());
        Ok(event)
    }

    async fn list_incident_events(&self, incident_id: Uuid) -> StoreResult<Vec<IncidentEvent>> {
        Ok(self.incident_events.get(&incident_id).map(|e| e.clone()).unwrap_or_default())
    }

    async fn list_active_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        Ok(self
            .channels
            .iter()
            .map(|e| e.value().clone())
            .filter(|c| c.is_active)
            .collect())
    }

    async fn list_channels(&self) -> StoreResult<Vec<NotificationChannel>> {
        Ok(self.channels.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        self.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn update_channel(&self, channel: NotificationChannel) -> StoreResult<NotificationChannel> {
        self.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: Uuid) -> StoreResult<()> {
        self.channels.remove(&id);
        Ok(())
    }

    async fn insert_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog> {
        self.notification_logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn update_notification_log(&self, log: NotificationLog) -> StoreResult<NotificationLog> {
        self.notification_logs.insert(log.id, log.clone());
        Ok(log)
    }

    async fn check_and_set_cooldown(
        &self,
        channel_id: Uuid,
        incident_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> StoreResult<bool> {
        let key = (channel_id, incident_id);
        let cooldown = chrono::Duration::from_std(cooldown).unwrap_or_default();
        let mut allowed = false;
        self.cooldowns
            .entry(key)
            .and_modify(|last| {
                if now - *last >= cooldown {
                    *last = now;
                    allowed = true;
                }
            })
            .or_insert_with(|| {
                allowed = true;
                now
            });
        Ok(allowed)
    }

    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<OnCallSchedule>> {
        Ok(self.schedules.get(&id).map(|e| e.clone()))
    }

    async fn list_schedules(&self) -> StoreResult<Vec<OnCallSchedule>> {
        Ok(self.schedules.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_schedule(&self, schedule: OnCallSchedule) -> StoreResult<OnCallSchedule> {
        self.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: OnCallSchedule) -> StoreResult<OnCallSchedule> {
        self.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn list_overrides(&self, schedule_id: Uuid) -> StoreResult<Vec<OnCallOverride>> {
        Ok(self.overrides.get(&schedule_id).map(|e| e.clone()).unwrap_or_default())
    }

    async fn create_override(&self, over: OnCallOverride) -> StoreResult<OnCallOverride> {
        self.overrides.entry(over.schedule_id).or_default().push(over.clone());
        Ok(over)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|e| e.clone()))
    }

    async fn list_mappings_by_priority(&self) -> StoreResult<Vec<ServiceEscalationMapping>> {
        let mut mappings: Vec<ServiceEscalationMapping> =
            self.mappings.iter().map(|e| e.value().clone()).collect();
        mappings.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(mappings)
    }

    async fn create_mapping(
        &self,
        mapping: ServiceEscalationMapping,
    ) -> StoreResult<ServiceEscalationMapping> {
        self.mappings.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn get_policy(&self, id: Uuid) -> StoreResult<Option<EscalationPolicy>> {
        Ok(self.policies.get(&id).map(|e| e.clone()))
    }

    async fn list_policies(&self) -> StoreResult<Vec<EscalationPolicy>> {
        Ok(self.policies.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_policy(&self, policy: EscalationPolicy) -> StoreResult<EscalationPolicy> {
        self.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }
}

// silence unused-import warning path for HashMap left available to future
// backends that need multi-key grouping; not used directly here.
#[allow(unused)]
type _Unused = HashMap<(), ()>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn cooldown_allows_first_then_blocks_within_window() {
        let store = MemoryStore::new();
        let channel = Uuid::new_v4();
        let incident = Uuid::new_v4();
        let t0 = now();

        assert!(store
            .check_and_set_cooldown(channel, incident, t0, Duration::from_secs(300))
            .await
            .unwrap());

        let t1 = t0 + chrono::Duration::seconds(30);
        assert!(!store
            .check_and_set_cooldown(channel, incident, t1, Duration::from_secs(300))
            .await
            .unwrap());

        let t2 = t0 + chrono::Duration::seconds(301);
        assert!(store
            .check_and_set_cooldown(channel, incident, t2, Duration::from_secs(300))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn duplicate_alert_lookup_respects_window_and_status() {
        let store = MemoryStore::new();
        let t0 = now();
        let mut alert = Alert::from_normalized(
            crate::model::NormalizedAlert {
                name: "HighCPU".into(),
                source: "generic".into(),
                severity: Severity::Critical,
                ..Default::default()
            },
            "abc123".into(),
            t0,
        );
        alert.last_received_at = t0;
        store.insert_alert(alert.clone()).await.unwrap();

        let found = store
            .find_duplicate_alert("abc123", Duration::from_secs(300), t0 + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert!(found.is_some());

        let stale = store
            .find_duplicate_alert(
                "abc123",
                Duration::from_secs(300),
                t0 + chrono::Duration::seconds(400),
            )
            .await
            .unwrap();
        assert!(stale.is_none());
    }
}
