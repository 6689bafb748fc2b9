//! Engine configuration.
//!
//! Provides a unified `EngineConfig` document used by the library and the
//! CLI: the severity policy table, scoring knobs, working hours, holidays
//! and live-validation timing. Loaded from JSON and validated as a whole.

mod calendar;
mod policy;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use calendar::{Holiday, HolidayCalendar, WorkingHours};
pub use policy::{ConflictRule, ScoringPolicy, SeverityPolicy};

const ENGINE_SCHEMA_VERSION: u32 = 1;
const MAX_DEBOUNCE_MS: u64 = 5_000;
const MAX_HORIZON_DAYS: u32 = 366;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub severity_policy: SeverityPolicy,
    #[serde(default)]
    pub scoring_policy: ScoringPolicy,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub holidays: HolidayCalendar,
    /// Minimum gap wanted between events at different venues
    #[serde(default = "default_travel_buffer_minutes")]
    pub travel_buffer_minutes: u32,
    /// Quiet period before a live conflict check runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub search: SearchDefaults,
}

/// Default bounds for the suggestion search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchDefaults {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            step_minutes: default_step_minutes(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: ENGINE_SCHEMA_VERSION,
            severity_policy: SeverityPolicy::default(),
            scoring_policy: ScoringPolicy::default(),
            working_hours: WorkingHours::default(),
            holidays: HolidayCalendar::default(),
            travel_buffer_minutes: default_travel_buffer_minutes(),
            debounce_ms: default_debounce_ms(),
            search: SearchDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; a present but invalid file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No engine config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        parse_engine_config(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != ENGINE_SCHEMA_VERSION {
            return Err(Error::InvalidPolicy(format!(
                "unsupported engine schema_version {} (expected {})",
                self.schema_version, ENGINE_SCHEMA_VERSION
            )));
        }
        self.severity_policy.validate()?;
        self.scoring_policy.validate()?;
        self.working_hours.validate()?;

        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(Error::InvalidPolicy(format!(
                "debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.debounce_ms
            )));
        }
        if self.search.horizon_days == 0 || self.search.horizon_days > MAX_HORIZON_DAYS {
            return Err(Error::InvalidPolicy(format!(
                "search.horizon_days must be within 1..={MAX_HORIZON_DAYS}"
            )));
        }
        if self.search.step_minutes == 0 {
            return Err(Error::InvalidPolicy(
                "search.step_minutes must be positive".to_string(),
            ));
        }
        if self.search.max_suggestions == 0 {
            return Err(Error::InvalidPolicy(
                "search.max_suggestions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and validate an engine config from a raw JSON payload.
pub fn parse_engine_config(payload: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_json::from_str(payload)?;
    config.validate()?;
    Ok(config)
}

const fn default_schema_version() -> u32 {
    ENGINE_SCHEMA_VERSION
}

const fn default_travel_buffer_minutes() -> u32 {
    15
}

const fn default_debounce_ms() -> u64 {
    600
}

const fn default_horizon_days() -> u32 {
    14
}

const fn default_step_minutes() -> u32 {
    30
}

const fn default_max_suggestions() -> usize {
    5
}
