//! Candidate event being scheduled or edited

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::event::{EventId, NewEvent, Priority, ScheduledEvent};
use super::interval::TimeInterval;

/// The slot a user is trying to book, checked against existing events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub interval: TimeInterval,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub participant_ids: BTreeSet<String>,
    #[serde(default)]
    pub optional_participant_ids: BTreeSet<String>,
    #[serde(default)]
    pub organizer_id: Option<String>,
    #[serde(default)]
    pub resource_ids: BTreeSet<String>,
    /// Event being edited; it is never compared with itself.
    #[serde(default)]
    pub exclude_event_id: Option<EventId>,
}

impl Candidate {
    pub const fn new(interval: TimeInterval) -> Self {
        Self {
            interval,
            venue: None,
            participant_ids: BTreeSet::new(),
            optional_participant_ids: BTreeSet::new(),
            organizer_id: None,
            resource_ids: BTreeSet::new(),
            exclude_event_id: None,
        }
    }

    /// Candidate describing an existing event, excluding the event itself.
    pub fn from_event(event: &ScheduledEvent) -> Self {
        Self {
            interval: event.interval,
            venue: event.venue.clone(),
            participant_ids: event.participant_ids.clone(),
            optional_participant_ids: event.optional_participant_ids.clone(),
            organizer_id: event.organizer_id.clone(),
            resource_ids: event.resource_ids.clone(),
            exclude_event_id: Some(event.id),
        }
    }

    #[must_use]
    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    #[must_use]
    pub fn with_participants<I, S>(mut self, participant_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participant_ids = participant_ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_optional_participants<I, S>(mut self, participant_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_participant_ids = participant_ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_organizer(mut self, organizer_id: impl Into<String>) -> Self {
        self.organizer_id = Some(organizer_id.into());
        self
    }

    #[must_use]
    pub fn with_resources<I, S>(mut self, resource_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_ids = resource_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Same candidate moved to another slot and venue.
    #[must_use]
    pub fn rescheduled(&self, interval: TimeInterval, venue: Option<String>) -> Self {
        Self {
            interval,
            venue,
            ..self.clone()
        }
    }

    /// Required and optional attendees together.
    pub fn attendees(&self) -> BTreeSet<&str> {
        self.participant_ids
            .iter()
            .chain(&self.optional_participant_ids)
            .map(String::as_str)
            .collect()
    }

    /// Whether `person_id` only attends optionally.
    pub fn is_optional_only(&self, person_id: &str) -> bool {
        self.optional_participant_ids.contains(person_id)
            && !self.participant_ids.contains(person_id)
            && self.organizer_id.as_deref() != Some(person_id)
    }

    /// Creation request for this slot.
    pub fn to_new_event(&self, title: impl Into<String>, priority: Priority) -> NewEvent {
        NewEvent {
            title: title.into(),
            interval: self.interval,
            venue: self.venue.clone(),
            participant_ids: self.participant_ids.clone(),
            optional_participant_ids: self.optional_participant_ids.clone(),
            organizer_id: self.organizer_id.clone(),
            resource_ids: self.resource_ids.clone(),
            priority,
        }
    }
}
