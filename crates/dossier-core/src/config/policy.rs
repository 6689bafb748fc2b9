//! Severity and scoring policy tables.
//!
//! Both tables are injected configuration: the detector and ranker never
//! hard-code a severity or a score.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ConflictType, Priority, Severity};

/// Detection rule looked up in the severity table.
///
/// Finer-grained than [`ConflictType`]: an overlap involving only optional
/// attendees is its own rule so it can be ranked lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    Venue,
    Participant,
    OptionalParticipant,
    Organizer,
    Holiday,
    Resource,
    TravelTime,
}

impl ConflictRule {
    pub const ALL: [Self; 7] = [
        Self::Venue,
        Self::Participant,
        Self::OptionalParticipant,
        Self::Organizer,
        Self::Holiday,
        Self::Resource,
        Self::TravelTime,
    ];

    pub const fn conflict_type(self) -> ConflictType {
        match self {
            Self::Venue => ConflictType::Venue,
            Self::Participant | Self::OptionalParticipant => ConflictType::Participant,
            Self::Organizer => ConflictType::Organizer,
            Self::Holiday => ConflictType::Holiday,
            Self::Resource => ConflictType::Resource,
            Self::TravelTime => ConflictType::TravelTime,
        }
    }

    const fn default_severity(self) -> Severity {
        match self {
            Self::Organizer => Severity::Critical,
            Self::Venue | Self::Resource => Severity::High,
            Self::Participant | Self::Holiday => Severity::Medium,
            Self::OptionalParticipant | Self::TravelTime => Severity::Low,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Venue => "venue",
            Self::Participant => "participant",
            Self::OptionalParticipant => "optional_participant",
            Self::Organizer => "organizer",
            Self::Holiday => "holiday",
            Self::Resource => "resource",
            Self::TravelTime => "travel_time",
        }
    }
}

impl fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from detection rule to severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityPolicy {
    rules: BTreeMap<ConflictRule, Severity>,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            rules: ConflictRule::ALL
                .iter()
                .map(|rule| (*rule, rule.default_severity()))
                .collect(),
        }
    }
}

impl SeverityPolicy {
    /// Build a policy from an explicit table. Every rule must be mapped.
    pub fn new(rules: BTreeMap<ConflictRule, Severity>) -> Result<Self> {
        let policy = Self { rules };
        policy.validate()?;
        Ok(policy)
    }

    /// Override a single rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ConflictRule, severity: Severity) -> Self {
        self.rules.insert(rule, severity);
        self
    }

    pub fn severity_for(&self, rule: ConflictRule) -> Severity {
        self.rules
            .get(&rule)
            .copied()
            .unwrap_or_else(|| rule.default_severity())
    }

    pub fn rules(&self) -> impl Iterator<Item = (ConflictRule, Severity)> + '_ {
        self.rules.iter().map(|(rule, severity)| (*rule, *severity))
    }

    pub fn validate(&self) -> Result<()> {
        let missing = ConflictRule::ALL
            .iter()
            .filter(|rule| !self.rules.contains_key(rule))
            .map(|rule| rule.as_str())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidPolicy(format!(
                "severity policy is missing rules: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Scoring knobs for the suggestion ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringPolicy {
    /// Priority score used when a slot still conflicts with an event of this priority
    #[serde(default = "default_priority_scores")]
    pub priority_scores: BTreeMap<Priority, f64>,
    /// Slots with a conflict at or above this severity are never suggested
    #[serde(default = "default_blocking_severity")]
    pub blocking_severity: Severity,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            priority_scores: default_priority_scores(),
            blocking_severity: default_blocking_severity(),
        }
    }
}

impl ScoringPolicy {
    pub fn priority_score(&self, priority: Priority) -> f64 {
        self.priority_scores
            .get(&priority)
            .copied()
            .unwrap_or_else(|| default_priority_score(priority))
    }

    pub fn validate(&self) -> Result<()> {
        for priority in Priority::ALL {
            let Some(score) = self.priority_scores.get(&priority) else {
                return Err(Error::InvalidPolicy(format!(
                    "scoring policy is missing a score for priority '{priority}'"
                )));
            };
            if !score.is_finite() || !(0.0..=1.0).contains(score) {
                return Err(Error::InvalidPolicy(format!(
                    "priority score for '{priority}' must be within [0, 1], got {score}"
                )));
            }
        }
        if self.blocking_severity > Severity::High {
            return Err(Error::InvalidPolicy(format!(
                "blocking severity must be at most 'high', got '{}'",
                self.blocking_severity.as_str()
            )));
        }
        Ok(())
    }

    /// Severity from which a slot is ruled out. Never looser than `high`.
    pub fn effective_blocking_severity(&self) -> Severity {
        self.blocking_severity.min(Severity::High)
    }
}

fn default_priority_scores() -> BTreeMap<Priority, f64> {
    Priority::ALL
        .iter()
        .map(|priority| (*priority, default_priority_score(*priority)))
        .collect()
}

const fn default_priority_score(priority: Priority) -> f64 {
    match priority {
        Priority::Low => 0.75,
        Priority::Medium => 0.5,
        Priority::High => 0.25,
        Priority::Critical => 0.0,
    }
}

const fn default_blocking_severity() -> Severity {
    Severity::High
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_maps_every_rule() {
        let policy = SeverityPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.severity_for(ConflictRule::Organizer), Severity::Critical);
        assert_eq!(policy.severity_for(ConflictRule::Venue), Severity::High);
        assert_eq!(
            policy.severity_for(ConflictRule::OptionalParticipant),
            Severity::Low
        );
    }

    #[test]
    fn incomplete_table_is_rejected() {
        let rules = BTreeMap::from([(ConflictRule::Venue, Severity::Low)]);
        let error = SeverityPolicy::new(rules).unwrap_err();
        assert!(error.to_string().contains("organizer"));
    }

    #[test]
    fn table_round_trips_through_json_keys() {
        let policy = SeverityPolicy::default().with_rule(ConflictRule::Venue, Severity::Critical);
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"venue\":\"critical\""));
        let parsed: SeverityPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
    }

    #[test]
    fn scoring_rejects_out_of_range_scores() {
        let mut scoring = ScoringPolicy::default();
        assert!(scoring.validate().is_ok());
        scoring.priority_scores.insert(Priority::Low, 1.5);
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn scoring_rejects_blocking_above_high() {
        let scoring = ScoringPolicy {
            blocking_severity: Severity::Critical,
            ..ScoringPolicy::default()
        };
        let error = scoring.validate().unwrap_err();
        assert!(error.to_string().contains("blocking severity"));
        assert_eq!(scoring.effective_blocking_severity(), Severity::High);

        let stricter = ScoringPolicy {
            blocking_severity: Severity::Medium,
            ..ScoringPolicy::default()
        };
        assert!(stricter.validate().is_ok());
        assert_eq!(stricter.effective_blocking_severity(), Severity::Medium);
    }

    #[test]
    fn priority_score_decreases_with_priority() {
        let scoring = ScoringPolicy::default();
        assert!(scoring.priority_score(Priority::Low) > scoring.priority_score(Priority::High));
        assert!(scoring.priority_score(Priority::Critical).abs() < f64::EPSILON);
    }
}
