//! Optimistic-locking edit sessions.
//!
//! An [`EditSession`] holds the record an editor last read plus the fields the
//! user changed since. Saving is a compare-and-swap against the store; on a
//! version mismatch the session enters the conflict phase and waits for the
//! user to reload, force the overwrite, or cancel. Nothing is merged per field.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{Actor, EventId, EventPatch, ScheduledEvent};
use crate::store::{EventStore, StoreError};

/// Editable fields of an event as a JSON object.
pub type Record = Map<String, Value>;

/// Store-managed fields that never take part in an edit.
const METADATA_FIELDS: [&str; 5] = ["id", "version", "updated_at", "created_by", "updated_by"];

/// Editable view of an event.
pub fn event_record(event: &ScheduledEvent) -> Result<Record> {
    let Value::Object(mut record) = serde_json::to_value(event)? else {
        return Err(Error::InvalidInput(
            "event did not serialize to an object".to_string(),
        ));
    };
    for field in METADATA_FIELDS {
        record.remove(field);
    }
    Ok(record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Editing,
    Saving,
    Success,
    Conflict,
    Reloaded,
    Overwritten,
}

impl EditPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::Saving => "saving",
            Self::Success => "success",
            Self::Conflict => "conflict",
            Self::Reloaded => "reloaded",
            Self::Overwritten => "overwritten",
        }
    }

    const fn accepts_edits(self) -> bool {
        matches!(
            self,
            Self::Editing | Self::Success | Self::Reloaded | Self::Overwritten
        )
    }
}

impl fmt::Display for EditPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a failed save, shown to the user for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditConflict {
    pub local_changes: Record,
    pub server_record: Record,
    pub server_version: u64,
    /// Fields whose local value differs from the server's
    pub conflicting_fields: BTreeSet<String>,
    server_event: ScheduledEvent,
}

impl EditConflict {
    pub fn new(local_changes: Record, server_event: ScheduledEvent) -> Result<Self> {
        let server_record = event_record(&server_event)?;
        let conflicting_fields = local_changes
            .iter()
            .filter(|(field, value)| server_record.get(field.as_str()) != Some(*value))
            .map(|(field, _)| field.clone())
            .collect();

        Ok(Self {
            local_changes,
            server_record,
            server_version: server_event.version,
            conflicting_fields,
            server_event,
        })
    }

    pub const fn server_event(&self) -> &ScheduledEvent {
        &self.server_event
    }
}

/// Result of a save or force-overwrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(ScheduledEvent),
    Conflict(EditConflict),
}

/// One editor's in-progress changes to a stored event.
#[derive(Debug, Clone)]
pub struct EditSession {
    base: ScheduledEvent,
    local_changes: Record,
    phase: EditPhase,
    conflict: Option<EditConflict>,
    writes: usize,
}

impl EditSession {
    /// Start editing from the record and version the editor just read.
    pub fn new(base: ScheduledEvent) -> Self {
        Self {
            base,
            local_changes: Record::new(),
            phase: EditPhase::Editing,
            conflict: None,
            writes: 0,
        }
    }

    pub const fn event_id(&self) -> EventId {
        self.base.id
    }

    pub const fn base(&self) -> &ScheduledEvent {
        &self.base
    }

    pub const fn base_version(&self) -> u64 {
        self.base.version
    }

    pub const fn phase(&self) -> EditPhase {
        self.phase
    }

    pub const fn local_changes(&self) -> &Record {
        &self.local_changes
    }

    pub const fn conflict(&self) -> Option<&EditConflict> {
        self.conflict.as_ref()
    }

    /// Store writes this session has attempted
    pub const fn writes_performed(&self) -> usize {
        self.writes
    }

    /// Record a local change. Values are validated against the event schema.
    pub fn set_field(&mut self, field: &str, value: impl Serialize) -> Result<()> {
        self.require(self.phase.accepts_edits(), "edit")?;
        if METADATA_FIELDS.contains(&field) {
            return Err(Error::InvalidInput(format!("{field} is managed by the store")));
        }

        let mut changes = self.local_changes.clone();
        changes.insert(field.to_string(), serde_json::to_value(value)?);
        let patch = patch_from(&changes)
            .map_err(|error| Error::InvalidInput(format!("invalid value for {field}: {error}")))?;

        self.local_changes = canonical_changes(&patch)?;
        self.phase = EditPhase::Editing;
        Ok(())
    }

    /// Compare-and-swap the local changes against the base version.
    ///
    /// A store failure other than a version mismatch is returned as an error and
    /// leaves the session editing with its changes intact.
    pub async fn save(&mut self, store: &dyn EventStore, actor: &Actor) -> Result<SaveOutcome> {
        self.require(self.phase.accepts_edits(), "save")?;
        if self.local_changes.is_empty() {
            self.phase = EditPhase::Success;
            return Ok(SaveOutcome::Saved(self.base.clone()));
        }

        let patch = patch_from(&self.local_changes)?;
        self.phase = EditPhase::Saving;
        self.writes += 1;
        match store
            .update(self.base.id, &patch, self.base.version, actor)
            .await
        {
            Ok(saved) => {
                tracing::info!("Saved event {} at version {}", saved.id, saved.version);
                self.accept_saved(saved.clone(), EditPhase::Success);
                Ok(SaveOutcome::Saved(saved))
            }
            Err(StoreError::VersionConflict { current, .. }) => self.enter_conflict(*current),
            Err(error) => {
                self.phase = EditPhase::Editing;
                Err(error.into())
            }
        }
    }

    /// Discard every local change and adopt the server record.
    pub fn reload(&mut self) -> Result<&ScheduledEvent> {
        let conflict = self.take_conflict("reload")?;
        self.base = conflict.server_event;
        self.local_changes.clear();
        self.phase = EditPhase::Reloaded;
        Ok(&self.base)
    }

    /// Write every local change over the server record, using its version.
    pub async fn force_overwrite(
        &mut self,
        store: &dyn EventStore,
        actor: &Actor,
    ) -> Result<SaveOutcome> {
        self.require(self.phase == EditPhase::Conflict, "overwrite")?;
        let Some(conflict) = self.conflict.as_ref() else {
            return Err(self.invalid("overwrite"));
        };
        let server_version = conflict.server_version;
        let patch = patch_from(&self.local_changes)?;

        self.phase = EditPhase::Saving;
        self.writes += 1;
        match store
            .update(self.base.id, &patch, server_version, actor)
            .await
        {
            Ok(saved) => {
                tracing::info!(
                    "Overwrote event {} over server version {}",
                    saved.id,
                    server_version
                );
                self.conflict = None;
                self.accept_saved(saved.clone(), EditPhase::Overwritten);
                Ok(SaveOutcome::Saved(saved))
            }
            Err(StoreError::VersionConflict { current, .. }) => self.enter_conflict(*current),
            Err(error) => {
                self.phase = EditPhase::Conflict;
                Err(error.into())
            }
        }
    }

    /// Back to editing with local changes intact; nothing is written.
    pub fn cancel(&mut self) -> Result<()> {
        self.take_conflict("cancel")?;
        self.phase = EditPhase::Editing;
        Ok(())
    }

    fn accept_saved(&mut self, saved: ScheduledEvent, phase: EditPhase) {
        self.base = saved;
        self.local_changes.clear();
        self.phase = phase;
    }

    fn enter_conflict(&mut self, server_event: ScheduledEvent) -> Result<SaveOutcome> {
        let conflict = EditConflict::new(self.local_changes.clone(), server_event)?;
        tracing::warn!(
            "Edit conflict on event {}: base version {}, server version {}, fields {:?}",
            self.base.id,
            self.base.version,
            conflict.server_version,
            conflict.conflicting_fields
        );
        self.conflict = Some(conflict.clone());
        self.phase = EditPhase::Conflict;
        Ok(SaveOutcome::Conflict(conflict))
    }

    fn take_conflict(&mut self, action: &'static str) -> Result<EditConflict> {
        self.require(self.phase == EditPhase::Conflict, action)?;
        self.conflict.take().ok_or_else(|| self.invalid(action))
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    const fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            phase: self.phase.as_str(),
            action,
        }
    }
}

fn patch_from(changes: &Record) -> Result<EventPatch> {
    Ok(serde_json::from_value(Value::Object(changes.clone()))?)
}

fn canonical_changes(patch: &EventPatch) -> Result<Record> {
    match serde_json::to_value(patch)? {
        Value::Object(record) => Ok(record),
        _ => Ok(Record::new()),
    }
}
