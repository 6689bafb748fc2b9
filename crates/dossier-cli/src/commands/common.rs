use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dossier_core::config::ConflictRule;
use dossier_core::models::{Priority, Severity, Suggestion};
use dossier_core::store::{EventStore, InMemoryEventStore, RestEventStore, RestStoreConfig};
use dossier_core::{Candidate, DetectionReport, EngineConfig, ScheduledEvent, SchedulingService};
use serde::de::DeserializeOwned;

use crate::error::CliError;

const CONFIG_ENV: &str = "DOSSIER_CONFIG";
const CONFIG_FILE_NAME: &str = "engine.json";

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    resolve_config_path_from(cli_config_path, env::var_os(CONFIG_ENV))
}

/// Flag first, then the environment, then the user config directory.
pub fn resolve_config_path_from(
    cli_config_path: Option<PathBuf>,
    env_config_path: Option<OsString>,
) -> PathBuf {
    cli_config_path
        .or_else(|| {
            env_config_path
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(default_config_path)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dossier")
        .join(CONFIG_FILE_NAME)
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig, CliError> {
    Ok(EngineConfig::load_from_path(path)?)
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|error| invalid_file(path, &error))?;
    serde_json::from_str(&raw).map_err(|error| invalid_file(path, &error))
}

fn invalid_file(path: &Path, error: &dyn std::fmt::Display) -> CliError {
    CliError::InvalidFile {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

pub fn read_candidate(path: &Path) -> Result<Candidate, CliError> {
    read_json_file(path)
}

/// Events from a JSON file, or the Supabase table when no file is given.
pub fn open_store(events_path: Option<&Path>) -> Result<Arc<dyn EventStore>, CliError> {
    if let Some(path) = events_path {
        let events = read_json_file::<Vec<ScheduledEvent>>(path)?;
        tracing::debug!("Loaded {} events from {}", events.len(), path.display());
        return Ok(Arc::new(InMemoryEventStore::with_events(events)));
    }

    match RestStoreConfig::from_env()? {
        Some(config) => {
            tracing::debug!("Reading events from Supabase table {}", config.table);
            Ok(Arc::new(RestEventStore::new(config)?))
        }
        None => Err(CliError::NoEventSource),
    }
}

pub fn open_service(
    config_path: &Path,
    events_path: Option<&Path>,
) -> Result<SchedulingService, CliError> {
    let config = load_engine_config(config_path)?;
    let store = open_store(events_path)?;
    Ok(SchedulingService::new(store, config)?)
}

pub fn format_report_lines(report: &DetectionReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.has_conflicts {
        for conflict in &report.conflicts {
            lines.push(format!(
                "[{}] {} {}: {}",
                conflict.severity.as_str().to_ascii_uppercase(),
                conflict.conflict_type.as_str(),
                conflict.overlap_interval,
                conflict.message
            ));
        }
        lines.push(format_severity_summary(report));
    } else {
        lines.push("No conflicts found.".to_string());
    }

    for warning in &report.warnings {
        lines.push(format!("warning: {warning}"));
    }
    lines
}

fn format_severity_summary(report: &DetectionReport) -> String {
    Severity::ALL
        .iter()
        .rev()
        .map(|severity| format!("{}: {}", severity.as_str(), report.count(*severity)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_suggestion_lines(suggestions: &[Suggestion]) -> Vec<String> {
    if suggestions.is_empty() {
        return vec!["No alternatives found.".to_string()];
    }

    suggestions
        .iter()
        .enumerate()
        .map(|(index, suggestion)| {
            let venue = suggestion
                .alternative_venue
                .as_deref()
                .map(|venue| format!(" at {venue}"))
                .unwrap_or_default();
            format!(
                "{}. {}{} score {:.2} (availability {:.2}, priority {:.2}, travel {:.2})",
                index + 1,
                suggestion.interval,
                venue,
                suggestion.overall_score,
                suggestion.availability_score,
                suggestion.priority_score,
                suggestion.travel_feasibility_score
            )
        })
        .collect()
}

pub fn format_policy_lines(config: &EngineConfig) -> Vec<String> {
    let mut lines = vec!["Severity policy:".to_string()];
    for rule in ConflictRule::ALL {
        lines.push(format!(
            "  {:<22}{}",
            rule.as_str(),
            config.severity_policy.severity_for(rule).as_str()
        ));
    }

    lines.push("Priority scores:".to_string());
    for priority in Priority::ALL {
        lines.push(format!(
            "  {:<22}{:.2}",
            priority.as_str(),
            config.scoring_policy.priority_score(priority)
        ));
    }
    lines.push(format!(
        "Blocking severity: {}",
        config.scoring_policy.blocking_severity.as_str()
    ));

    let hours = &config.working_hours;
    let days = hours
        .working_days
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!(
        "Working hours: {} to {} ({days}) UTC{}",
        hours.start.format("%H:%M"),
        hours.end.format("%H:%M"),
        hours.offset()
    ));
    lines.push(format!("Holidays: {}", config.holidays.len()));
    lines.push(format!(
        "Travel buffer: {} minutes",
        config.travel_buffer_minutes
    ));
    lines.push(format!("Debounce: {} ms", config.debounce_ms));
    lines.push(format!(
        "Search: {} days, {} minute steps, up to {} suggestions",
        config.search.horizon_days, config.search.step_minutes, config.search.max_suggestions
    ));
    lines
}
