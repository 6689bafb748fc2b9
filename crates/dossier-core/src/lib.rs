//! dossier-core - Scheduling conflict engine for Dossier
//!
//! This crate contains the scheduling models, the conflict detector, the
//! suggestion ranker, optimistic edit sessions and the event store boundary
//! used by every Dossier interface (CLI and embedding applications).

pub mod config;
pub mod conflict;
pub mod edit;
pub mod error;
pub mod live;
pub mod models;
pub mod services;
pub mod store;
mod util;

pub use config::EngineConfig;
pub use conflict::{ConflictDetector, SuggestionConstraints, SuggestionRanker};
pub use error::{Error, Result};
pub use models::{Candidate, DetectionReport, EventId, ScheduledEvent, TimeInterval};
pub use services::SchedulingService;
