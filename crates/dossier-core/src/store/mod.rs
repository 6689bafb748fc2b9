//! Event store boundary.
//!
//! The engine never owns event persistence. It reads a window of events
//! through [`EventStore::list`] and writes through [`EventStore::create`]
//! and [`EventStore::update`], relying on the store's version
//! compare-and-swap for concurrency control.

mod memory;
mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Actor, EventId, EventPatch, NewEvent, ScheduledEvent, TimeInterval};

pub use memory::InMemoryEventStore;
pub use rest::{RestEventStore, RestStoreConfig};

/// Errors surfaced by an event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached; callers must not read this as "no conflicts"
    #[error("Event store unavailable: {0}")]
    Unavailable(String),
    #[error("Event not found: {0}")]
    NotFound(String),
    /// Compare-and-swap failure, carrying the record currently on the server
    #[error(
        "Version conflict on event {}: expected version {expected}, server has {}",
        current.id,
        current.version
    )]
    VersionConflict {
        expected: u64,
        current: Box<ScheduledEvent>,
    },
    #[error("Event store API error: {0}")]
    Api(String),
    #[error("Invalid event store payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidPayload(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend for scheduled events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events overlapping `range`, ordered by start time.
    async fn list(&self, range: &TimeInterval) -> StoreResult<Vec<ScheduledEvent>>;

    async fn get(&self, id: EventId) -> StoreResult<ScheduledEvent>;

    async fn create(&self, new_event: NewEvent, actor: &Actor) -> StoreResult<ScheduledEvent>;

    /// Apply `patch` only if the stored version still equals `expected_version`.
    async fn update(
        &self,
        id: EventId,
        patch: &EventPatch,
        expected_version: u64,
        actor: &Actor,
    ) -> StoreResult<ScheduledEvent>;
}
