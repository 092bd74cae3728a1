//! Canonical severity, alert status, and incident status enums.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Totally ordered severity: `info < low < warning < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Warning,
    High,
    Critical,
}

const SEVERITY_ORDER: [Severity; 5] = [
    Severity::Info,
    Severity::Low,
    Severity::Warning,
    Severity::High,
    Severity::Critical,
];

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Warning => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    /// The severity immediately below this one in the ordering, wrapping
    /// at `Info`. Used (intentionally, see `correlation.rs`) to reproduce
    /// the `severity_changed` event's `from`-field quirk: it is the new
    /// severity's predecessor, not the incident's actual prior severity.
    pub fn predecessor(&self) -> Severity {
        let idx = self.rank() as usize;
        SEVERITY_ORDER[idx.saturating_sub(1)]
    }

    pub fn max(a: Severity, b: Severity) -> Severity {
        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }

    /// Map a provider severity/priority alias into the canonical enum.
    /// Falls back to `Warning` for anything unrecognized, per §4.1.
    pub fn from_alias(raw: &str) -> Severity {
        match raw.to_lowercase().as_str() {
            "info" | "informational" | "none" | "success" => Severity::Info,
            "low" | "minor" | "p4" | "p5" => Severity::Low,
            "warning" | "warn" | "w" | "ticket" => Severity::Warning,
            "high" | "major" | "p2" => Severity::High,
            "critical" | "page" | "urgent" | "p1" | "fatal" | "error" => Severity::Critical,
            _ => Severity::Warning,
        }
    }

    /// Bucket a numeric risk score (0-100) into a severity, per §3.
    pub fn from_risk_score(score: f64) -> Severity {
        if score >= 80.0 {
            Severity::Critical
        } else if score >= 60.0 {
            Severity::High
        } else if score >= 40.0 {
            Severity::Warning
        } else if score >= 20.0 {
            Severity::Low
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Strict parse of the canonical string form, for query parameters and
    /// config — unlike `from_alias`, unrecognized input is rejected rather
    /// than defaulted.
    pub fn parse(raw: &str) -> Option<Severity> {
        match raw.to_lowercase().as_str() {
            "info" => Some(Severity::Info),
            "low" => Some(Severity::Low),
            "warning" => Some(Severity::Warning),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Acknowledged,
    Resolved,
    Suppressed,
    Archived,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Suppressed => "suppressed",
            AlertStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<AlertStatus> {
        match raw.to_lowercase().as_str() {
            "firing" => Some(AlertStatus::Firing),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            "suppressed" => Some(AlertStatus::Suppressed),
            "archived" => Some(AlertStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Acknowledged => "acknowledged",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_total() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Warning);
        assert!(Severity::Warning < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn max_picks_higher() {
        assert_eq!(Severity::max(Severity::Low, Severity::Critical), Severity::Critical);
        assert_eq!(Severity::max(Severity::High, Severity::Warning), Severity::High);
    }

    #[test]
    fn predecessor_wraps_at_info() {
        assert_eq!(Severity::Info.predecessor(), Severity::Info);
        assert_eq!(Severity::Critical.predecessor(), Severity::High);
    }

    #[test]
    fn risk_score_buckets() {
        assert_eq!(Severity::from_risk_score(95.0), Severity::Critical);
        assert_eq!(Severity::from_risk_score(65.0), Severity::High);
        assert_eq!(Severity::from_risk_score(45.0), Severity::Warning);
        assert_eq!(Severity::from_risk_score(25.0), Severity::Low);
        assert_eq!(Severity::from_risk_score(5.0), Severity::Info);
    }

    #[test]
    fn alias_fallback_is_warning() {
        assert_eq!(Severity::from_alias("whatever"), Severity::Warning);
        assert_eq!(Severity::from_alias("page"), Severity::Critical);
    }
}
