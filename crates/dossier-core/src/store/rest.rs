//! Supabase PostgREST event store.

use std::collections::BTreeSet;
use std::env;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EventStore, StoreError, StoreResult};
use crate::error::{Error, Result};
use crate::models::{
    Actor, EventId, EventPatch, NewEvent, Priority, ScheduledEvent, TimeInterval,
};
use crate::util::{clean_label, compact_text, is_http_url};

const ENV_URL: &str = "SUPABASE_URL";
const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_EVENTS_TABLE: &str = "DOSSIER_EVENTS_TABLE";
const DEFAULT_EVENTS_TABLE: &str = "events";

/// Connection settings for the events table.
#[derive(Clone, PartialEq, Eq)]
pub struct RestStoreConfig {
    /// Base REST endpoint, ending in `/rest/v1`
    pub rest_url: String,
    pub anon_key: String,
    pub table: String,
}

impl fmt::Debug for RestStoreConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RestStoreConfig")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

impl RestStoreConfig {
    /// Load the store configuration from environment variables.
    ///
    /// Returns `Ok(None)` when neither URL nor key is set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.rest_url, self.table)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<RestStoreConfig>> {
    let url = clean_label(lookup(ENV_URL));
    let anon_key = clean_label(lookup(ENV_ANON_KEY));
    let table = clean_label(lookup(ENV_EVENTS_TABLE));

    let (url, anon_key) = match (url, anon_key) {
        (None, None) => return Ok(None),
        (Some(url), Some(anon_key)) => (url, anon_key),
        (None, Some(_)) => {
            return Err(Error::InvalidInput(format!(
                "Event store configuration is incomplete. Missing: {ENV_URL}"
            )))
        }
        (Some(_), None) => {
            return Err(Error::InvalidInput(format!(
                "Event store configuration is incomplete. Missing: {ENV_ANON_KEY}"
            )))
        }
    };

    let table = table.unwrap_or_else(|| DEFAULT_EVENTS_TABLE.to_string());
    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::InvalidInput(format!(
            "{ENV_EVENTS_TABLE} must be a plain table name, got {table:?}"
        )));
    }

    Ok(Some(RestStoreConfig {
        rest_url: normalize_rest_url(&url)?,
        anon_key,
        table,
    }))
}

fn normalize_rest_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{ENV_URL} must not be empty")));
    }
    if !is_http_url(trimmed) {
        return Err(Error::InvalidInput(format!(
            "{ENV_URL} must include http:// or https://"
        )));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

/// `EventStore` over a Supabase table, using `version` as the CAS column.
#[derive(Clone)]
pub struct RestEventStore {
    config: RestStoreConfig,
    access_token: Option<String>,
    client: Client,
}

impl fmt::Debug for RestEventStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RestEventStore")
            .field("config", &self.config)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl RestEventStore {
    pub fn new(config: RestStoreConfig) -> StoreResult<Self> {
        Ok(Self {
            config,
            access_token: None,
            client: Client::builder().build()?,
        })
    }

    /// Authenticate requests as a signed-in user instead of the anon role.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = clean_label(Some(access_token.into()));
        self
    }

    pub const fn config(&self) -> &RestStoreConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.config.anon_key);
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    async fn fetch_rows(&self, request: RequestBuilder) -> StoreResult<Vec<ScheduledEvent>> {
        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(parse_api_error(status, &body)));
        }
        let body = response.text().await?;
        decode_rows(&body)
    }
}

/// Malformed rows are payload errors, not transport failures.
fn decode_rows(body: &str) -> StoreResult<Vec<ScheduledEvent>> {
    let rows = serde_json::from_str::<Vec<EventRow>>(body)?;
    rows.into_iter().map(ScheduledEvent::try_from).collect()
}

#[async_trait]
impl EventStore for RestEventStore {
    async fn list(&self, range: &TimeInterval) -> StoreResult<Vec<ScheduledEvent>> {
        let request = self.client.get(self.config.table_url()).query(&[
            ("select", "*".to_string()),
            ("start_at", format!("lt.{}", range.end().to_rfc3339())),
            ("end_at", format!("gt.{}", range.start().to_rfc3339())),
            ("order", "start_at.asc,id.asc".to_string()),
        ]);
        let events = self.fetch_rows(request).await?;
        tracing::debug!("Listed {} events from {}", events.len(), self.config.table);
        Ok(events)
    }

    async fn get(&self, id: EventId) -> StoreResult<ScheduledEvent> {
        let request = self
            .client
            .get(self.config.table_url())
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        self.fetch_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self, new_event: NewEvent, actor: &Actor) -> StoreResult<ScheduledEvent> {
        let event = ScheduledEvent::from_new(new_event, actor);
        let request = self
            .client
            .post(self.config.table_url())
            .header("Prefer", "return=representation")
            .json(&EventRow::from(&event));
        let created = self
            .fetch_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::InvalidPayload("insert returned no representation".to_string())
            })?;
        tracing::info!("Created event {} ({})", created.id, created.title);
        Ok(created)
    }

    async fn update(
        &self,
        id: EventId,
        patch: &EventPatch,
        expected_version: u64,
        actor: &Actor,
    ) -> StoreResult<ScheduledEvent> {
        let columns = patch_columns(patch, expected_version, actor)?;
        let request = self
            .client
            .patch(self.config.table_url())
            .query(&[
                ("id", format!("eq.{id}")),
                ("version", format!("eq.{expected_version}")),
            ])
            .header("Prefer", "return=representation")
            .json(&columns);

        if let Some(updated) = self.fetch_rows(request).await?.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched both filters: either the row is gone or its version moved on.
        let current = self.get(id).await?;
        tracing::warn!(
            "Version conflict on event {}: expected {}, server has {}",
            id,
            expected_version,
            current.version
        );
        Err(StoreError::VersionConflict {
            expected: expected_version,
            current: Box::new(current),
        })
    }
}

/// Flat row layout of the events table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EventRow {
    id: String,
    #[serde(default)]
    title: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    participant_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    optional_participant_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    organizer_id: Option<String>,
    #[serde(default)]
    resource_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    priority: Priority,
    version: u64,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    updated_by: Option<String>,
}

impl TryFrom<EventRow> for ScheduledEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> StoreResult<Self> {
        let id = row
            .id
            .parse::<EventId>()
            .map_err(|error| StoreError::InvalidPayload(format!("event id {}: {error}", row.id)))?;
        let interval = TimeInterval::new(row.start_at, row.end_at)
            .map_err(|error| StoreError::InvalidPayload(format!("event {id}: {error}")))?;

        Ok(Self {
            id,
            title: row.title,
            interval,
            venue: clean_label(row.venue),
            participant_ids: row.participant_ids.unwrap_or_default(),
            optional_participant_ids: row.optional_participant_ids.unwrap_or_default(),
            organizer_id: clean_label(row.organizer_id),
            resource_ids: row.resource_ids.unwrap_or_default(),
            priority: row.priority,
            version: row.version,
            updated_at: row
                .updated_at
                .map_or(0, |updated_at| updated_at.timestamp_millis()),
            created_by: row.created_by,
            updated_by: row.updated_by,
        })
    }
}

impl From<&ScheduledEvent> for EventRow {
    fn from(event: &ScheduledEvent) -> Self {
        Self {
            id: event.id.as_str(),
            title: event.title.clone(),
            start_at: event.interval.start(),
            end_at: event.interval.end(),
            venue: event.venue.clone(),
            participant_ids: Some(event.participant_ids.clone()),
            optional_participant_ids: Some(event.optional_participant_ids.clone()),
            organizer_id: event.organizer_id.clone(),
            resource_ids: Some(event.resource_ids.clone()),
            priority: event.priority,
            version: event.version,
            updated_at: DateTime::from_timestamp_millis(event.updated_at),
            created_by: event.created_by.clone(),
            updated_by: event.updated_by.clone(),
        }
    }
}

/// Column updates for a PATCH, including the bumped version and audit stamp.
fn patch_columns(
    patch: &EventPatch,
    expected_version: u64,
    actor: &Actor,
) -> StoreResult<Map<String, Value>> {
    let mut columns = Map::new();
    if let Some(title) = &patch.title {
        columns.insert("title".to_string(), Value::from(title.as_str()));
    }
    if let Some(interval) = patch.interval {
        columns.insert("start_at".to_string(), serde_json::to_value(interval.start())?);
        columns.insert("end_at".to_string(), serde_json::to_value(interval.end())?);
    }
    if let Some(venue) = &patch.venue {
        columns.insert(
            "venue".to_string(),
            serde_json::to_value(clean_label(venue.clone()))?,
        );
    }
    if let Some(participants) = &patch.participant_ids {
        columns.insert("participant_ids".to_string(), serde_json::to_value(participants)?);
    }
    if let Some(optional) = &patch.optional_participant_ids {
        columns.insert(
            "optional_participant_ids".to_string(),
            serde_json::to_value(optional)?,
        );
    }
    if let Some(organizer) = &patch.organizer_id {
        columns.insert(
            "organizer_id".to_string(),
            serde_json::to_value(clean_label(organizer.clone()))?,
        );
    }
    if let Some(resources) = &patch.resource_ids {
        columns.insert("resource_ids".to_string(), serde_json::to_value(resources)?);
    }
    if let Some(priority) = patch.priority {
        columns.insert("priority".to_string(), serde_json::to_value(priority)?);
    }

    columns.insert(
        "version".to_string(),
        Value::from(expected_version.saturating_add(1)),
    );
    columns.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);
    columns.insert("updated_by".to_string(), Value::from(actor.user_id.as_str()));
    Ok(columns)
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message {
            let extra = payload.details.or(payload.hint);
            return match extra {
                Some(extra) => {
                    format!("{} ({}): {}", message.trim(), status.as_u16(), extra.trim())
                }
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
