//! Debounced conflict checks for an edit form.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::conflict::ConflictDetector;
use crate::error::Result;
use crate::models::{Candidate, DetectionReport, TimeInterval};
use crate::store::EventStore;

/// How far around the candidate to load events, so neighbours are visible to travel checks.
const DEFAULT_LOOKUP_PADDING_HOURS: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed {
        request_id: u64,
        report: DetectionReport,
    },
    /// A newer check (or a cancel) arrived first; the result was dropped
    Superseded { request_id: u64 },
}

impl CheckOutcome {
    pub const fn report(&self) -> Option<&DetectionReport> {
        match self {
            Self::Completed { report, .. } => Some(report),
            Self::Superseded { .. } => None,
        }
    }
}

/// Conflict checker for one form instance.
///
/// Every call to [`check`](Self::check) takes a new request id; only the call
/// holding the latest id may complete. Clones share the same id counter.
#[derive(Clone)]
pub struct LiveConflictChecker {
    store: Arc<dyn EventStore>,
    detector: Arc<ConflictDetector>,
    debounce: Duration,
    lookup_padding: chrono::Duration,
    latest_request_id: Arc<AtomicU64>,
}

impl fmt::Debug for LiveConflictChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConflictChecker")
            .field("debounce", &self.debounce)
            .field("lookup_padding", &self.lookup_padding)
            .field("latest_request_id", &self.latest_request_id())
            .finish_non_exhaustive()
    }
}

impl LiveConflictChecker {
    pub fn new(
        store: Arc<dyn EventStore>,
        detector: Arc<ConflictDetector>,
        debounce: Duration,
    ) -> Self {
        Self {
            store,
            detector,
            debounce,
            lookup_padding: chrono::Duration::hours(DEFAULT_LOOKUP_PADDING_HOURS),
            latest_request_id: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub const fn with_lookup_padding(mut self, padding: chrono::Duration) -> Self {
        self.lookup_padding = padding;
        self
    }

    pub fn latest_request_id(&self) -> u64 {
        self.latest_request_id.load(Ordering::SeqCst)
    }

    /// Supersede whatever check is in flight.
    pub fn cancel_pending(&self) {
        self.latest_request_id.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait out the debounce window, then load events and run detection.
    ///
    /// A store failure is an error, never an empty report.
    pub async fn check(&self, candidate: Candidate) -> Result<CheckOutcome> {
        let request_id = self.latest_request_id.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.debounce).await;
        if self.is_stale(request_id) {
            tracing::debug!("Conflict check {} superseded during debounce", request_id);
            return Ok(CheckOutcome::Superseded { request_id });
        }

        let window = self.lookup_window(&candidate.interval);
        let listed = self.store.list(&window).await;
        if self.is_stale(request_id) {
            tracing::warn!("Discarding stale conflict check {}", request_id);
            return Ok(CheckOutcome::Superseded { request_id });
        }
        let existing = listed?;

        let report = self.detector.detect(&candidate, &existing);
        if self.is_stale(request_id) {
            tracing::warn!("Discarding stale conflict check {}", request_id);
            return Ok(CheckOutcome::Superseded { request_id });
        }

        Ok(CheckOutcome::Completed { request_id, report })
    }

    fn lookup_window(&self, interval: &TimeInterval) -> TimeInterval {
        interval.expanded(self.lookup_padding)
    }

    fn is_stale(&self, request_id: u64) -> bool {
        self.latest_request_id.load(Ordering::SeqCst) != request_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{Actor, EventId, EventPatch, NewEvent, ScheduledEvent};
    use crate::store::{InMemoryEventStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    const DEBOUNCE: Duration = Duration::from_millis(600);

    fn slot(start_hour: u32, end_hour: u32) -> TimeInterval {
        TimeInterval::new(
            Utc.with_ymd_and_hms(2025, 3, 3, start_hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 3, end_hour, 0, 0).unwrap(),
        )
        .unwrap()
    }

    async fn store_with_room_a_booked() -> Arc<InMemoryEventStore> {
        let store = Arc::new(InMemoryEventStore::new());
        store
            .create(
                NewEvent {
                    title: "Trade delegation".to_string(),
                    interval: slot(10, 11),
                    venue: Some("Room A".to_string()),
                    participant_ids: BTreeSet::new(),
                    optional_participant_ids: BTreeSet::new(),
                    organizer_id: None,
                    resource_ids: BTreeSet::new(),
                    priority: crate::models::Priority::Medium,
                },
                &Actor::new("planner"),
            )
            .await
            .unwrap();
        store
    }

    fn checker(store: Arc<dyn EventStore>) -> LiveConflictChecker {
        LiveConflictChecker::new(store, Arc::new(ConflictDetector::default()), DEBOUNCE)
    }

    /// Store whose reads take a full second.
    struct SlowStore {
        inner: Arc<InMemoryEventStore>,
    }

    #[async_trait]
    impl EventStore for SlowStore {
        async fn list(&self, range: &TimeInterval) -> StoreResult<Vec<ScheduledEvent>> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.inner.list(range).await
        }

        async fn get(&self, id: EventId) -> StoreResult<ScheduledEvent> {
            self.inner.get(id).await
        }

        async fn create(&self, new_event: NewEvent, actor: &Actor) -> StoreResult<ScheduledEvent> {
            self.inner.create(new_event, actor).await
        }

        async fn update(
            &self,
            id: EventId,
            patch: &EventPatch,
            expected_version: u64,
            actor: &Actor,
        ) -> StoreResult<ScheduledEvent> {
            self.inner.update(id, patch, expected_version, actor).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_check_completes_after_debounce() {
        let checker = checker(store_with_room_a_booked().await);
        let started = tokio::time::Instant::now();

        let outcome = checker
            .check(Candidate::new(slot(10, 12)).with_venue("Room A"))
            .await
            .unwrap();

        assert!(started.elapsed() >= DEBOUNCE);
        let report = outcome.report().unwrap();
        assert!(report.has_conflicts);
        assert_eq!(report.conflicts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_only_complete_the_last_check() {
        let checker = checker(store_with_room_a_booked().await);
        let typing = checker.clone();

        let (first, second) = tokio::join!(
            checker.check(Candidate::new(slot(10, 11)).with_venue("Room A")),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                typing
                    .check(Candidate::new(slot(12, 13)).with_venue("Room A"))
                    .await
            }
        );

        assert_eq!(
            first.unwrap(),
            CheckOutcome::Superseded { request_id: 1 }
        );
        let second = second.unwrap();
        assert!(matches!(second, CheckOutcome::Completed { request_id: 2, .. }));
        assert!(!second.report().unwrap().has_conflicts);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_is_discarded_once_superseded() {
        let inner = store_with_room_a_booked().await;
        let checker = checker(Arc::new(SlowStore { inner }));
        let newer = checker.clone();

        let (stale, fresh) = tokio::join!(
            checker.check(Candidate::new(slot(10, 11)).with_venue("Room A")),
            async {
                // lands while the first check is waiting on the store
                tokio::time::sleep(Duration::from_millis(900)).await;
                newer.check(Candidate::new(slot(14, 15))).await
            }
        );

        assert!(matches!(stale.unwrap(), CheckOutcome::Superseded { .. }));
        assert!(matches!(fresh.unwrap(), CheckOutcome::Completed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_supersedes_in_flight_check() {
        let checker = checker(store_with_room_a_booked().await);
        let canceller = checker.clone();

        let (outcome, ()) = tokio::join!(
            checker.check(Candidate::new(slot(10, 11)).with_venue("Room A")),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                canceller.cancel_pending();
            }
        );

        assert!(matches!(outcome.unwrap(), CheckOutcome::Superseded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_is_not_reported_as_clear() {
        let store = store_with_room_a_booked().await;
        store.set_available(false);
        let checker = checker(store);

        let error = checker
            .check(Candidate::new(slot(10, 11)).with_venue("Room A"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Store(StoreError::Unavailable(_))));
    }
}
