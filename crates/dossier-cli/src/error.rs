use std::io;

use dossier_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] dossier_core::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read {path}: {message}")]
    InvalidFile { path: String, message: String },
    #[error(
        "No event source. Pass --events <file>, or set SUPABASE_URL and SUPABASE_ANON_KEY to read from Supabase."
    )]
    NoEventSource,
    #[error("Duration must be a positive number of minutes, got {0}")]
    InvalidDuration(i64),
    #[error("Suggestion limit must be at least 1")]
    InvalidLimit,
}
