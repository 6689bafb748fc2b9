//! Scheduled event model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::actor::Actor;
use super::interval::TimeInterval;
use crate::util::{clean_label, unix_millis_now};

/// A unique identifier for an event, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new unique event ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Event priority as set by the organizer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar event as owned by the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Unique identifier
    pub id: EventId,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// When the event takes place
    pub interval: TimeInterval,
    /// Room or location label
    #[serde(default)]
    pub venue: Option<String>,
    /// Required attendees
    #[serde(default)]
    pub participant_ids: BTreeSet<String>,
    /// Attendees whose presence is optional
    #[serde(default)]
    pub optional_participant_ids: BTreeSet<String>,
    /// Person who owns the event
    #[serde(default)]
    pub organizer_id: Option<String>,
    /// Bookable equipment or services (interpreters, vehicles, ...)
    #[serde(default)]
    pub resource_ids: BTreeSet<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Compare-and-swap token, bumped by every successful update
    #[serde(default)]
    pub version: u64,
    /// Last update timestamp (Unix ms)
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl ScheduledEvent {
    /// Build a stored event from a creation request.
    #[must_use]
    pub fn from_new(new_event: NewEvent, actor: &Actor) -> Self {
        Self {
            id: EventId::new(),
            title: new_event.title,
            interval: new_event.interval,
            venue: clean_label(new_event.venue),
            participant_ids: new_event.participant_ids,
            optional_participant_ids: new_event.optional_participant_ids,
            organizer_id: clean_label(new_event.organizer_id),
            resource_ids: new_event.resource_ids,
            priority: new_event.priority,
            version: 1,
            updated_at: unix_millis_now(),
            created_by: Some(actor.user_id.clone()),
            updated_by: Some(actor.user_id.clone()),
        }
    }

    /// Whether `person_id` attends (required or optional) or organizes the event.
    pub fn involves(&self, person_id: &str) -> bool {
        self.participant_ids.contains(person_id)
            || self.optional_participant_ids.contains(person_id)
            || self.organizer_id.as_deref() == Some(person_id)
    }

    /// Required and optional attendees together.
    pub fn attendees(&self) -> BTreeSet<&str> {
        self.participant_ids
            .iter()
            .chain(&self.optional_participant_ids)
            .map(String::as_str)
            .collect()
    }
}

/// Request to create an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
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
    #[serde(default)]
    pub priority: Priority,
}

/// Partial update of an event. `None` leaves a field untouched.
///
/// Nullable fields use a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<TimeInterval>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub venue: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_participant_ids: Option<BTreeSet<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub organizer_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl EventPatch {
    /// Patch that moves an event to a new slot and optionally a new venue.
    #[must_use]
    pub fn reschedule(interval: TimeInterval, venue: Option<String>) -> Self {
        Self {
            interval: Some(interval),
            venue: venue.map(Some),
            ..Self::default()
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.interval.is_none()
            && self.venue.is_none()
            && self.participant_ids.is_none()
            && self.optional_participant_ids.is_none()
            && self.organizer_id.is_none()
            && self.resource_ids.is_none()
            && self.priority.is_none()
    }

    /// Apply the patch in place. Version and audit fields are left to the store.
    pub fn apply(&self, event: &mut ScheduledEvent) {
        if let Some(title) = &self.title {
            event.title.clone_from(title);
        }
        if let Some(interval) = self.interval {
            event.interval = interval;
        }
        if let Some(venue) = &self.venue {
            event.venue = clean_label(venue.clone());
        }
        if let Some(participants) = &self.participant_ids {
            event.participant_ids.clone_from(participants);
        }
        if let Some(optional) = &self.optional_participant_ids {
            event.optional_participant_ids.clone_from(optional);
        }
        if let Some(organizer) = &self.organizer_id {
            event.organizer_id = clean_label(organizer.clone());
        }
        if let Some(resources) = &self.resource_ids {
            event.resource_ids.clone_from(resources);
        }
        if let Some(priority) = self.priority {
            event.priority = priority;
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
