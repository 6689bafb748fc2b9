//! Data models for the dossier scheduling engine

mod actor;
mod candidate;
mod conflict;
mod event;
mod interval;
mod suggestion;

pub use actor::Actor;
pub use candidate::Candidate;
pub use conflict::{Conflict, ConflictType, DetectionReport, Severity};
pub use event::{EventId, EventPatch, NewEvent, Priority, ScheduledEvent};
pub use interval::TimeInterval;
pub use suggestion::Suggestion;
