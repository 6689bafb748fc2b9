//! Scheduling service tying the engine to an event store.

use std::sync::Arc;

use chrono::Duration;

use crate::config::EngineConfig;
use crate::conflict::{ConflictDetector, SuggestionConstraints, SuggestionRanker, TravelModel};
use crate::edit::EditSession;
use crate::error::{Error, Result};
use crate::live::LiveConflictChecker;
use crate::models::{
    Actor, Candidate, DetectionReport, EventId, EventPatch, Priority, ScheduledEvent, Suggestion,
    TimeInterval,
};
use crate::store::EventStore;

/// Events this far either side of a slot are loaded so travel checks see neighbours.
const NEIGHBOUR_PADDING_HOURS: i64 = 12;

/// Where an accepted suggestion is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptTarget {
    /// Book a new event in the suggested slot
    Create { title: String, priority: Priority },
    /// Move an existing event, guarded by the version the caller last read
    Update { id: EventId, expected_version: u64 },
}

/// Thread-safe entry point for conflict checks, suggestions and writes.
#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<dyn EventStore>,
    detector: Arc<ConflictDetector>,
    ranker: SuggestionRanker,
    config: EngineConfig,
}

impl SchedulingService {
    /// Build a service from a validated engine config.
    pub fn new(store: Arc<dyn EventStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let ranker = SuggestionRanker::from_config(&config);
        Ok(Self {
            store,
            detector: Arc::new(ranker.detector().clone()),
            ranker,
            config,
        })
    }

    /// Use `model` for travel-time conflicts and travel scores.
    #[must_use]
    pub fn with_travel_model(mut self, model: Arc<dyn TravelModel>) -> Self {
        let detector = ConflictDetector::from_config(&self.config).with_travel_model(model);
        self.ranker = SuggestionRanker::new(detector.clone(), self.config.scoring_policy.clone());
        self.detector = Arc::new(detector);
        self
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store)
    }

    /// Constraints seeded from the configured search defaults.
    pub fn constraints(&self, duration_minutes: i64) -> SuggestionConstraints {
        SuggestionConstraints::from_config(duration_minutes, &self.config)
    }

    /// Detect conflicts for `candidate` against the current store contents.
    pub async fn check_conflicts(&self, candidate: &Candidate) -> Result<DetectionReport> {
        let window = candidate
            .interval
            .expanded(Duration::hours(NEIGHBOUR_PADDING_HOURS));
        let existing = self.store.list(&window).await?;
        Ok(self.detector.detect(candidate, &existing))
    }

    /// Rank alternative slots for `candidate`. Runs only when the user asks.
    pub async fn suggest_alternatives(
        &self,
        candidate: &Candidate,
        constraints: &SuggestionConstraints,
    ) -> Result<Vec<Suggestion>> {
        constraints.validate()?;
        let window = search_window(candidate, constraints)?;
        let existing = self.store.list(&window).await?;
        let conflicts = self.detector.detect(candidate, &existing).conflicts;
        tracing::debug!(
            "Searching alternatives for {} against {} events ({} current conflicts)",
            candidate.interval,
            existing.len(),
            conflicts.len()
        );
        self.ranker
            .suggest(candidate, &conflicts, constraints, &existing)
    }

    /// Write `suggestion`, after re-validating it against the current event set.
    ///
    /// Fails with [`Error::SuggestionNoLongerValid`] when the slot picked up a
    /// blocking conflict since it was suggested.
    pub async fn accept_suggestion(
        &self,
        candidate: &Candidate,
        suggestion: &Suggestion,
        target: AcceptTarget,
        actor: &Actor,
    ) -> Result<ScheduledEvent> {
        let venue = suggestion
            .alternative_venue
            .clone()
            .or_else(|| candidate.venue.clone());
        let mut moved = candidate.rescheduled(suggestion.interval, venue);
        if let AcceptTarget::Update { id, .. } = &target {
            moved.exclude_event_id = Some(*id);
        }

        let report = self.check_conflicts(&moved).await?;
        if self.ranker.is_blocking(&report) {
            let reason = report
                .conflicts
                .first()
                .map_or_else(|| moved.interval.to_string(), |conflict| conflict.message.clone());
            tracing::warn!("Rejected stale suggestion for {}: {}", moved.interval, reason);
            return Err(Error::SuggestionNoLongerValid(reason));
        }

        let saved = match target {
            AcceptTarget::Create { title, priority } => {
                self.store
                    .create(moved.to_new_event(title, priority), actor)
                    .await?
            }
            AcceptTarget::Update {
                id,
                expected_version,
            } => {
                let patch =
                    EventPatch::reschedule(moved.interval, suggestion.alternative_venue.clone());
                self.store
                    .update(id, &patch, expected_version, actor)
                    .await?
            }
        };
        tracing::info!(
            "Accepted suggestion: event {} now at {}",
            saved.id,
            saved.interval
        );
        Ok(saved)
    }

    /// Start an optimistic edit of a stored event.
    pub async fn edit_session(&self, id: EventId) -> Result<EditSession> {
        Ok(EditSession::new(self.store.get(id).await?))
    }

    /// Debounced checker for one form, sharing this service's store and detector.
    pub fn live_checker(&self) -> LiveConflictChecker {
        LiveConflictChecker::new(
            Arc::clone(&self.store),
            Arc::clone(&self.detector),
            self.config.debounce(),
        )
    }
}

/// Every event the slot search could touch, padded for neighbours.
fn search_window(
    candidate: &Candidate,
    constraints: &SuggestionConstraints,
) -> Result<TimeInterval> {
    let anchor = constraints
        .search_from
        .unwrap_or_else(|| candidate.interval.start());
    let padding = Duration::days(1);
    let start = anchor - padding;
    let end = anchor + Duration::days(i64::from(constraints.horizon_days)) + padding;
    TimeInterval::new(start.min(candidate.interval.start()), end.max(candidate.interval.end()))
}
