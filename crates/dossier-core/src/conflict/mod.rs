//! Conflict detection and rescheduling suggestions

mod detector;
mod ranker;
mod travel;

pub use detector::ConflictDetector;
pub use ranker::{SuggestionConstraints, SuggestionRanker};
pub use travel::{TransitTable, TravelModel};
