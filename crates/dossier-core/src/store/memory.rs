//! In-process event store

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EventStore, StoreError, StoreResult};
use crate::models::{Actor, EventId, EventPatch, NewEvent, ScheduledEvent, TimeInterval};
use crate::util::unix_millis_now;

/// `EventStore` backed by a map, with the same version semantics as a real backend.
#[derive(Debug)]
pub struct InMemoryEventStore {
    events: Mutex<BTreeMap<EventId, ScheduledEvent>>,
    writes: AtomicUsize,
    available: AtomicBool,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_events(Vec::new())
    }

    /// Seed the store without counting writes
    pub fn with_events(events: impl IntoIterator<Item = ScheduledEvent>) -> Self {
        Self {
            events: Mutex::new(events.into_iter().map(|event| (event.id, event)).collect()),
            writes: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Successful create and update calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<ScheduledEvent> {
        let events = self.events.lock().await;
        let mut listed = events.values().cloned().collect::<Vec<_>>();
        listed.sort_by_key(|event| (event.interval, event.id));
        listed
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ))
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn list(&self, range: &TimeInterval) -> StoreResult<Vec<ScheduledEvent>> {
        self.ensure_available()?;
        let events = self.events.lock().await;
        let mut listed = events
            .values()
            .filter(|event| event.interval.overlaps(range))
            .cloned()
            .collect::<Vec<_>>();
        listed.sort_by_key(|event| (event.interval, event.id));
        Ok(listed)
    }

    async fn get(&self, id: EventId) -> StoreResult<ScheduledEvent> {
        self.ensure_available()?;
        self.events
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self, new_event: NewEvent, actor: &Actor) -> StoreResult<ScheduledEvent> {
        self.ensure_available()?;
        let event = ScheduledEvent::from_new(new_event, actor);
        self.events.lock().await.insert(event.id, event.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Created event {} in memory store", event.id);
        Ok(event)
    }

    async fn update(
        &self,
        id: EventId,
        patch: &EventPatch,
        expected_version: u64,
        actor: &Actor,
    ) -> StoreResult<ScheduledEvent> {
        self.ensure_available()?;
        let mut events = self.events.lock().await;
        let event = events
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if event.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                current: Box::new(event.clone()),
            });
        }

        patch.apply(event);
        event.version += 1;
        event.updated_at = unix_millis_now();
        event.updated_by = Some(actor.user_id.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(event.clone())
    }
}
