//! Rescheduling suggestion search and scoring

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Days, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::detector::ConflictDetector;
use super::travel::TravelModel;
use crate::config::{EngineConfig, ScoringPolicy, SearchDefaults, WorkingHours};
use crate::error::{Error, Result};
use crate::models::{
    Candidate, Conflict, ConflictType, DetectionReport, EventId, Priority, ScheduledEvent,
    Suggestion, TimeInterval,
};
use crate::util::same_venue;

const MAX_HORIZON_DAYS: u32 = 366;
const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// What the caller needs from an alternative slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionConstraints {
    pub duration_minutes: i64,
    #[serde(default)]
    pub required_participant_ids: BTreeSet<String>,
    #[serde(default)]
    pub working_hours: WorkingHours,
    /// Earliest allowed start; defaults to the start of the original's day
    #[serde(default)]
    pub search_from: Option<DateTime<Utc>>,
    pub horizon_days: u32,
    pub step_minutes: u32,
    pub max_suggestions: usize,
    /// Hard cap on slots run through the detector
    #[serde(default)]
    pub max_evaluated_slots: Option<usize>,
    /// Venues to try at the original time when the original venue clashes
    #[serde(default)]
    pub alternative_venues: Vec<String>,
}

impl SuggestionConstraints {
    pub fn new(duration_minutes: i64, working_hours: WorkingHours) -> Self {
        Self::with_defaults(duration_minutes, working_hours, SearchDefaults::default())
    }

    /// Constraints using the configured working hours and search bounds.
    pub fn from_config(duration_minutes: i64, config: &EngineConfig) -> Self {
        Self::with_defaults(duration_minutes, config.working_hours.clone(), config.search)
    }

    fn with_defaults(
        duration_minutes: i64,
        working_hours: WorkingHours,
        defaults: SearchDefaults,
    ) -> Self {
        Self {
            duration_minutes,
            required_participant_ids: BTreeSet::new(),
            working_hours,
            search_from: None,
            horizon_days: defaults.horizon_days,
            step_minutes: defaults.step_minutes,
            max_suggestions: defaults.max_suggestions,
            max_evaluated_slots: None,
            alternative_venues: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_required_participants<I, S>(mut self, participant_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_participant_ids = participant_ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_search_from(mut self, search_from: DateTime<Utc>) -> Self {
        self.search_from = Some(search_from);
        self
    }

    #[must_use]
    pub const fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    #[must_use]
    pub const fn with_step_minutes(mut self, step_minutes: u32) -> Self {
        self.step_minutes = step_minutes;
        self
    }

    #[must_use]
    pub const fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    #[must_use]
    pub const fn with_max_evaluated_slots(mut self, max_evaluated_slots: usize) -> Self {
        self.max_evaluated_slots = Some(max_evaluated_slots);
        self
    }

    #[must_use]
    pub fn with_alternative_venues<I, S>(mut self, venues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternative_venues = venues.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_minutes <= 0 || self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(Error::InvalidInput(format!(
                "duration must be within 1..={MAX_DURATION_MINUTES} minutes, got {}",
                self.duration_minutes
            )));
        }
        if self.step_minutes == 0 {
            return Err(Error::InvalidInput("step must be positive".to_string()));
        }
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(Error::InvalidInput(format!(
                "horizon must be within 1..={MAX_HORIZON_DAYS} days"
            )));
        }
        if self.max_suggestions == 0 {
            return Err(Error::InvalidInput(
                "max_suggestions must be positive".to_string(),
            ));
        }
        self.working_hours.validate()
    }

    /// Upper bound on detector runs: horizon × slots per day plus venue probes.
    fn slot_budget(&self) -> usize {
        if let Some(limit) = self.max_evaluated_slots {
            return limit;
        }
        let window_minutes = (self.working_hours.end - self.working_hours.start).num_minutes();
        let slots_per_day = usize::try_from(window_minutes / i64::from(self.step_minutes))
            .unwrap_or(0)
            + 1;
        let days = usize::try_from(self.horizon_days).unwrap_or(usize::MAX);
        days.saturating_mul(slots_per_day)
            .saturating_add(self.alternative_venues.len())
    }
}

/// Proposes alternative slots, always re-validated through the detector.
#[derive(Debug, Clone, Default)]
pub struct SuggestionRanker {
    detector: ConflictDetector,
    scoring: ScoringPolicy,
}

impl SuggestionRanker {
    pub const fn new(detector: ConflictDetector, scoring: ScoringPolicy) -> Self {
        Self { detector, scoring }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ConflictDetector::from_config(config),
            config.scoring_policy.clone(),
        )
    }

    pub const fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    pub const fn scoring(&self) -> &ScoringPolicy {
        &self.scoring
    }

    /// Whether a report contains a conflict that rules the slot out.
    pub fn is_blocking(&self, report: &DetectionReport) -> bool {
        report.has_conflict_at_least(self.scoring.effective_blocking_severity())
    }

    /// Search for alternatives to `original`, best first.
    ///
    /// An empty result means nothing feasible was found inside the horizon.
    pub fn suggest(
        &self,
        original: &Candidate,
        conflicts: &[Conflict],
        constraints: &SuggestionConstraints,
        existing: &[ScheduledEvent],
    ) -> Result<Vec<Suggestion>> {
        constraints.validate()?;

        let priorities = existing
            .iter()
            .map(|event| (event.id, event.priority))
            .collect::<HashMap<EventId, Priority>>();
        let budget = constraints.slot_budget();
        let mut evaluated = 0usize;
        let mut suggestions = Vec::new();

        let venue_clash = conflicts
            .iter()
            .any(|conflict| conflict.conflict_type == ConflictType::Venue);
        let original_in_range = constraints
            .search_from
            .is_none_or(|not_before| original.interval.start() >= not_before);
        if venue_clash && original_in_range {
            for venue in &constraints.alternative_venues {
                if evaluated >= budget {
                    break;
                }
                if same_venue(Some(venue), original.venue.as_deref()) {
                    continue;
                }
                evaluated += 1;
                let probe = original.rescheduled(original.interval, Some(venue.clone()));
                if let Some(suggestion) =
                    self.evaluate(&probe, constraints, existing, &priorities, Some(venue))
                {
                    suggestions.push(suggestion);
                }
            }
        }

        let hours = &constraints.working_hours;
        let first_day = hours.local_date(
            constraints
                .search_from
                .unwrap_or_else(|| original.interval.start()),
        );
        let (Some(duration), Some(step)) = (
            Duration::try_minutes(constraints.duration_minutes),
            Duration::try_minutes(i64::from(constraints.step_minutes)),
        ) else {
            return Err(Error::InvalidInput(
                "duration or step is out of range".to_string(),
            ));
        };

        'days: for day in 0..constraints.horizon_days {
            let Some(date) = first_day.checked_add_days(Days::new(u64::from(day))) else {
                break;
            };
            let Some(window) = hours.window_on(date) else {
                continue;
            };

            let mut next_start = Some(window.start());
            if let Some(not_before) = constraints.search_from {
                while let Some(start) = next_start.filter(|start| *start < not_before) {
                    next_start = start.checked_add_signed(step);
                }
            }

            while let Some(slot_start) = next_start {
                let Some(slot_end) = slot_start
                    .checked_add_signed(duration)
                    .filter(|end| *end <= window.end())
                else {
                    break;
                };
                if evaluated >= budget {
                    tracing::debug!("Suggestion search stopped after {} slots", evaluated);
                    break 'days;
                }
                evaluated += 1;

                let interval = TimeInterval::new(slot_start, slot_end)?;
                next_start = slot_start.checked_add_signed(step);
                if interval == original.interval {
                    continue;
                }

                let probe = original.rescheduled(interval, original.venue.clone());
                if let Some(suggestion) =
                    self.evaluate(&probe, constraints, existing, &priorities, None)
                {
                    suggestions.push(suggestion);
                }
            }
        }

        suggestions.sort_by(suggestion_order);
        suggestions.truncate(constraints.max_suggestions);
        tracing::debug!(
            "Evaluated {} slots, returning {} suggestions",
            evaluated,
            suggestions.len()
        );
        Ok(suggestions)
    }

    fn evaluate(
        &self,
        probe: &Candidate,
        constraints: &SuggestionConstraints,
        existing: &[ScheduledEvent],
        priorities: &HashMap<EventId, Priority>,
        alternative_venue: Option<&String>,
    ) -> Option<Suggestion> {
        let report = self.detector.detect(probe, existing);
        if self.is_blocking(&report) {
            return None;
        }

        let availability =
            availability_score(probe, &constraints.required_participant_ids, existing);
        let priority = report
            .conflicts
            .iter()
            .map(|conflict| {
                conflict
                    .conflicting_event_id
                    .and_then(|id| priorities.get(&id).copied())
                    .unwrap_or_else(|| conflict.severity.as_priority())
            })
            .max()
            .map_or(1.0, |priority| self.scoring.priority_score(priority));
        let travel = self
            .detector
            .travel_model()
            .map_or(1.0, |model| travel_score(model, probe, existing));

        Some(Suggestion::new(
            probe.interval,
            availability,
            priority,
            travel,
            alternative_venue.cloned(),
        ))
    }
}

/// Fraction of `required` with nothing else booked during the probe.
#[allow(clippy::cast_precision_loss)] // participant counts are tiny
fn availability_score(
    probe: &Candidate,
    required: &BTreeSet<String>,
    existing: &[ScheduledEvent],
) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let free = required
        .iter()
        .filter(|person| {
            !existing.iter().any(|event| {
                Some(event.id) != probe.exclude_event_id
                    && event.involves(person)
                    && event.interval.overlaps(&probe.interval)
            })
        })
        .count();
    free as f64 / required.len() as f64
}

/// Worst gap-to-transit ratio over every attendee's neighbouring events.
fn travel_score(model: &dyn TravelModel, probe: &Candidate, existing: &[ScheduledEvent]) -> f64 {
    let Some(venue) = probe.venue.as_deref() else {
        return 1.0;
    };

    let mut people = probe.attendees();
    if let Some(organizer) = probe.organizer_id.as_deref() {
        people.insert(organizer);
    }

    let mut score = 1.0_f64;
    for person in people {
        let related = existing.iter().filter(|event| {
            Some(event.id) != probe.exclude_event_id && event.involves(person)
        });
        let previous = related
            .clone()
            .filter(|event| event.interval.end() <= probe.interval.start())
            .max_by_key(|event| event.interval.end());
        let next = related
            .filter(|event| event.interval.start() >= probe.interval.end())
            .min_by_key(|event| event.interval.start());

        let adjacencies = [
            previous.map(|event| (event, event.interval.gap_minutes_until(&probe.interval))),
            next.map(|event| (event, probe.interval.gap_minutes_until(&event.interval))),
        ];
        for (event, gap) in adjacencies.into_iter().flatten() {
            let Some(other_venue) = event.venue.as_deref() else {
                continue;
            };
            if same_venue(Some(other_venue), Some(venue)) {
                continue;
            }
            let Some(transit) = model.transit_minutes(other_venue, venue).filter(|t| *t > 0)
            else {
                continue;
            };
            let gap = u32::try_from(gap.unwrap_or(0).max(0)).unwrap_or(u32::MAX);
            score = score.min((f64::from(gap) / f64::from(transit)).min(1.0));
        }
    }
    score
}

/// Best overall score first; ties go to the earliest start.
fn suggestion_order(left: &Suggestion, right: &Suggestion) -> Ordering {
    right
        .overall_score
        .total_cmp(&left.overall_score)
        .then_with(|| left.interval.start().cmp(&right.interval.start()))
        .then_with(|| left.alternative_venue.cmp(&right.alternative_venue))
}
