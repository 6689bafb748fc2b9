//! Rescheduling suggestion model

use serde::{Deserialize, Serialize};

use super::interval::TimeInterval;

/// An alternative slot proposed for a conflicting candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub interval: TimeInterval,
    /// Fraction of required participants free in this slot
    pub availability_score: f64,
    /// 1.0 without remaining conflicts, lower for important conflicting events
    pub priority_score: f64,
    /// 1.0 unless transit between venues is too tight
    pub travel_feasibility_score: f64,
    /// Mean of the three scores
    pub overall_score: f64,
    /// Set when the suggestion keeps the time but changes the venue
    #[serde(default)]
    pub alternative_venue: Option<String>,
}

impl Suggestion {
    /// Build a suggestion; scores are clamped to `[0, 1]` and averaged.
    pub fn new(
        interval: TimeInterval,
        availability_score: f64,
        priority_score: f64,
        travel_feasibility_score: f64,
        alternative_venue: Option<String>,
    ) -> Self {
        let availability_score = clamp_unit(availability_score);
        let priority_score = clamp_unit(priority_score);
        let travel_feasibility_score = clamp_unit(travel_feasibility_score);
        Self {
            interval,
            availability_score,
            priority_score,
            travel_feasibility_score,
            overall_score: (availability_score + priority_score + travel_feasibility_score) / 3.0,
            alternative_venue,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
