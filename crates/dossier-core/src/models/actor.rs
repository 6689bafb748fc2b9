//! Acting user passed explicitly to store writes

use serde::{Deserialize, Serialize};

/// The user on whose behalf a write is performed.
///
/// Supplied by the identity provider; only used to stamp audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}
