//! Error types for dossier-core

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using dossier-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dossier-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Interval whose start is not strictly before its end
    #[error("Invalid interval: start {start} must be before end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Severity or scoring policy failed validation
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Edit session action not allowed from the current phase
    #[error("Cannot {action} while edit session is {phase}")]
    InvalidTransition {
        phase: &'static str,
        action: &'static str,
    },

    /// Event store failure (unavailable, not found, version conflict)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Accepted suggestion conflicts with the current event set
    #[error("Suggestion is no longer valid: {0}")]
    SuggestionNoLongerValid(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
