//! Conflict and detection report models

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::{EventId, Priority};
use super::interval::TimeInterval;

/// How serious a conflict is. Assigned by the severity policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Priority of the same rank, used when a conflict has no event behind it.
    pub const fn as_priority(self) -> Priority {
        match self {
            Self::Low => Priority::Low,
            Self::Medium => Priority::Medium,
            Self::High => Priority::High,
            Self::Critical => Priority::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of clash was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Venue,
    Participant,
    Organizer,
    Holiday,
    Resource,
    TravelTime,
}

impl ConflictType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Venue => "venue",
            Self::Participant => "participant",
            Self::Organizer => "organizer",
            Self::Holiday => "holiday",
            Self::Resource => "resource",
            Self::TravelTime => "travel_time",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blocking clash between the candidate and an existing event (or a holiday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub overlap_interval: TimeInterval,
    /// `None` for holiday conflicts
    pub conflicting_event_id: Option<EventId>,
    pub conflicting_event_title: Option<String>,
    pub affected_participant_ids: BTreeSet<String>,
    pub message: String,
}

/// Outcome of a detection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub has_conflicts: bool,
    pub conflicts: Vec<Conflict>,
    /// Advisory, non-blocking notes
    pub warnings: Vec<String>,
    /// Count per severity; every severity is present
    pub severity_summary: BTreeMap<Severity, usize>,
}

impl DetectionReport {
    pub fn new(conflicts: Vec<Conflict>, warnings: Vec<String>) -> Self {
        let mut severity_summary: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|severity| (*severity, 0)).collect();
        for conflict in &conflicts {
            *severity_summary.entry(conflict.severity).or_default() += 1;
        }

        Self {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
            warnings,
            severity_summary,
        }
    }

    /// Highest severity present, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.conflicts.iter().map(|conflict| conflict.severity).max()
    }

    /// Whether any conflict is at or above `threshold`.
    pub fn has_conflict_at_least(&self, threshold: Severity) -> bool {
        self.conflicts
            .iter()
            .any(|conflict| conflict.severity >= threshold)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.severity_summary.get(&severity).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn conflict(severity: Severity) -> Conflict {
        Conflict {
            conflict_type: ConflictType::Venue,
            severity,
            overlap_interval: TimeInterval::new(
                Utc.with_ymd_and_hms(2025, 3, 3, 10, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 3, 11, 0, 0).unwrap(),
            )
            .unwrap(),
            conflicting_event_id: None,
            conflicting_event_title: None,
            affected_participant_ids: BTreeSet::new(),
            message: String::new(),
        }
    }

    #[test]
    fn empty_report_has_zeroed_summary() {
        let report = DetectionReport::new(Vec::new(), Vec::new());
        assert!(!report.has_conflicts);
        assert_eq!(report.severity_summary.len(), 4);
        assert!(report.severity_summary.values().all(|count| *count == 0));
        assert_eq!(report.max_severity(), None);
    }

    #[test]
    fn summary_counts_each_severity() {
        let report = DetectionReport::new(
            vec![
                conflict(Severity::High),
                conflict(Severity::High),
                conflict(Severity::Low),
            ],
            Vec::new(),
        );
        assert_eq!(report.count(Severity::High), 2);
        assert_eq!(report.count(Severity::Low), 1);
        assert_eq!(report.count(Severity::Critical), 0);
        assert_eq!(report.max_severity(), Some(Severity::High));
        assert!(report.has_conflict_at_least(Severity::High));
        assert!(!report.has_conflict_at_least(Severity::Critical));
    }
}
