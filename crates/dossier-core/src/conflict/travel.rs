//! Venue-to-venue transit estimates

use std::collections::BTreeMap;
use std::fmt;

/// Caller-supplied location model.
///
/// `None` means "unknown", which never counts against a slot.
pub trait TravelModel: fmt::Debug + Send + Sync {
    fn transit_minutes(&self, from_venue: &str, to_venue: &str) -> Option<u32>;
}

/// Symmetric lookup table of transit times between venues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitTable {
    entries: BTreeMap<(String, String), u32>,
}

impl TransitTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_route(mut self, from: &str, to: &str, minutes: u32) -> Self {
        self.insert(from, to, minutes);
        self
    }

    pub fn insert(&mut self, from: &str, to: &str, minutes: u32) {
        self.entries.insert(route_key(from, to), minutes);
    }
}

impl TravelModel for TransitTable {
    fn transit_minutes(&self, from_venue: &str, to_venue: &str) -> Option<u32> {
        if from_venue.trim().eq_ignore_ascii_case(to_venue.trim()) {
            return Some(0);
        }
        self.entries.get(&route_key(from_venue, to_venue)).copied()
    }
}

fn route_key(from: &str, to: &str) -> (String, String) {
    let from = from.trim().to_ascii_lowercase();
    let to = to.trim().to_ascii_lowercase();
    if from <= to {
        (from, to)
    } else {
        (to, from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_symmetric_and_case_insensitive() {
        let table = TransitTable::new().with_route("Embassy", "Ministry", 40);
        assert_eq!(table.transit_minutes("ministry", "EMBASSY"), Some(40));
        assert_eq!(table.transit_minutes("Embassy", "Ministry"), Some(40));
        assert_eq!(table.transit_minutes("Embassy", "Airport"), None);
        assert_eq!(table.transit_minutes("Embassy", " embassy "), Some(0));
    }
}
