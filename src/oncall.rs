//! On-call resolution (C8): rotation arithmetic across hourly/daily/
//! weekly/custom cadences, IANA timezones, overrides, and escalation
//! policy walking.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{EscalationTargetType, OnCallSchedule, RotationType};
use crate::severity::Severity;
use crate::store::Store;

/// Resolve the IANA timezone, falling back to UTC on any parse failure.
fn resolve_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::UTC)
}

fn parse_handoff_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
}

/// Compute the currently responsible user id for a schedule, honoring
/// overrides before falling back to rotation arithmetic.
pub async fn get_current_oncall(
    store: &Arc<dyn Store>,
    schedule_id: Uuid,
    at_time: DateTime<Utc>,
) -> Result<Option<Uuid>, AppError> {
    let schedule = match store.get_schedule(schedule_id).await? {
        Some(s) if s.is_active => s,
        _ => return Ok(None),
    };

    let overrides = store.list_overrides(schedule_id).await?;
    let mut active_overrides: Vec<_> = overrides.into_iter().filter(|o| o.covers(at_time)).collect();
    active_overrides.sort_by_key(|o| std::cmp::Reverse(o.created_at));
    if let Some(over) = active_overrides.first() {
        if let Some(user) = store.get_user(over.user_id).await? {
            if user.is_active {
                return Ok(Some(user.id));
            }
        }
        return Ok(None);
    }

    if schedule.members.is_empty() {
        return Ok(None);
    }

    let index = rotation_index(&schedule, at_time);
    let member = &schedule.members[index];
    match store.get_user(member.user_id).await? {
        Some(user) if user.is_active => Ok(Some(user.id)),
        _ => Ok(None),
    }
}

/// Pure rotation arithmetic, split out for direct testing against the
/// worked examples in the spec.
pub fn rotation_index(schedule: &OnCallSchedule, at_time: DateTime<Utc>) -> usize {
    let n = schedule.members.len();
    if n == 0 {
        return 0;
    }

    let tz = resolve_timezone(&schedule.timezone);
    let handoff = parse_handoff_time(&schedule.handoff_time);

    let effective_in_tz = schedule.effective_from.with_timezone(&tz);
    let mut first_handoff = tz
        .with_ymd_and_hms(
            effective_in_tz.year(),
            effective_in_tz.month(),
            effective_in_tz.day(),
            handoff.hour(),
            handoff.minute(),
            0,
        )
        .single()
        .unwrap_or(effective_in_tz);
    if first_handoff < effective_in_tz {
        first_handoff += chrono::Duration::days(1);
    }

    let at_in_tz = at_time.with_timezone(&tz);
    let delta = at_in_tz - first_handoff;
    if delta.num_seconds() < 0 {
        return 0;
    }

    let idx = match schedule.rotation_type {
        RotationType::Hourly => {
            let hours = schedule.rotation_interval_hours.unwrap_or(1).max(1) as i64;
            (delta.num_seconds() / (hours * 3600)) as usize
        }
        RotationType::Daily => delta.num_days() as usize,
        RotationType::Weekly => (delta.num_days() / 7) as usize,
        RotationType::Custom => {
            let days = schedule.rotation_interval_days.max(1) as i64;
            (delta.num_days() / days) as usize
        }
    };
    idx % n
}

/// Find the highest-priority escalation mapping matching `service`/`severity`.
pub async fn find_escalation_policy(
    store: &Arc<dyn Store>,
    service: Option<&str>,
    severity: Option<Severity>,
) -> Result<Option<Uuid>, AppError> {
    let mappings = store.list_mappings_by_priority().await?;
    for mapping in mappings {
        let service_matches =
            glob::Pattern::new(&mapping.service_pattern).map(|p| p.matches(service.unwrap_or("*"))).unwrap_or(false);
        if !service_matches {
            continue;
        }
        if let (Some(filter), Some(sev)) = (&mapping.severity_filter, severity) {
            if !filter.contains(&sev) {
                continue;
            }
        }
        return Ok(Some(mapping.escalation_policy_id));
    }
    Ok(None)
}

/// Resolve the ordered, de-duplicated list of currently-active users for
/// an escalation level.
pub async fn resolve_escalation_targets(
    store: &Arc<dyn Store>,
    policy_id: Uuid,
    level: i32,
) -> Result<Vec<Uuid>, AppError> {
    let policy = match store.get_policy(policy_id).await? {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };
    let Some(target_level) = policy.levels.iter().find(|l| l.level == level) else {
        return Ok(Vec::new());
    };

    let mut resolved = Vec::new();
    for target in &target_level.targets {
        let user_id = match target.target_type {
            EscalationTargetType::User => {
                if let Some(user) = store.get_user(target.id).await? {
                    if user.is_active {
                        Some(user.id)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            EscalationTargetType::Schedule => get_current_oncall(store, target.id, Utc::now()).await?,
        };
        if let Some(id) = user_id {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OnCallMember;

    fn schedule(
        members: usize,
        rotation_type: RotationType,
        interval_hours: Option<i32>,
        interval_days: i32,
        effective_from: &str,
        handoff_time: &str,
    ) -> OnCallSchedule {
        OnCallSchedule {
            id: Uuid::new_v4(),
            name: "primary".into(),
            description: None,
            timezone: "UTC".into(),
            rotation_type,
            members: (0..members)
                .map(|i| OnCallMember { user_id: Uuid::new_v4(), order: i as i32 })
                .collect(),
            handoff_time: handoff_time.into(),
            rotation_interval_days: interval_days,
            rotation_interval_hours: interval_hours,
            effective_from: DateTime::parse_from_rfc3339(effective_from).unwrap().with_timezone(&Utc),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn s5_hourly_rotation_worked_example() {
        let s = schedule(3, RotationType::Hourly, Some(2), 7, "2025-01-01T00:00:00Z", "00:00");
        let at = DateTime::parse_from_rfc3339("2025-01-01T05:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(rotation_index(&s, at), 2);
    }

    #[test]
    fn before_first_handoff_is_index_zero() {
        let s = schedule(3, RotationType::Daily, None, 7, "2025-01-01T00:00:00Z", "12:00");
        let at = DateTime::parse_from_rfc3339("2025-01-01T01:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(rotation_index(&s, at), 0);
    }

    #[test]
    fn weekly_rotation_advances_every_seven_days() {
        let s = schedule(2, RotationType::Weekly, None, 7, "2025-01-01T00:00:00Z", "00:00");
        let at = DateTime::parse_from_rfc3339("2025-01-15T00:00:01Z").unwrap().with_timezone(&Utc);
        assert_eq!(rotation_index(&s, at), 0);
        let at2 = DateTime::parse_from_rfc3339("2025-01-08T00:00:01Z").unwrap().with_timezone(&Utc);
        assert_eq!(rotation_index(&s, at2), 1);
    }
}
