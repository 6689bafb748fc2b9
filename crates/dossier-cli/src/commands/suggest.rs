use std::path::Path;

use dossier_core::models::Suggestion;

use crate::commands::common::{format_suggestion_lines, open_service, read_candidate};
use crate::error::CliError;

/// Search options taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct SuggestOptions {
    pub duration_minutes: Option<i64>,
    pub required_participant_ids: Vec<String>,
    pub alternative_venues: Vec<String>,
    pub limit: Option<usize>,
    pub horizon_days: Option<u32>,
}

pub async fn run_suggest(
    events_path: Option<&Path>,
    candidate_path: &Path,
    options: &SuggestOptions,
    as_json: bool,
    config_path: &Path,
) -> Result<(), CliError> {
    let suggestions =
        suggest_for_candidate(events_path, candidate_path, options, config_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else {
        for line in format_suggestion_lines(&suggestions) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn suggest_for_candidate(
    events_path: Option<&Path>,
    candidate_path: &Path,
    options: &SuggestOptions,
    config_path: &Path,
) -> Result<Vec<Suggestion>, CliError> {
    let candidate = read_candidate(candidate_path)?;
    let duration = options
        .duration_minutes
        .unwrap_or_else(|| candidate.interval.duration_minutes());
    if duration <= 0 {
        return Err(CliError::InvalidDuration(duration));
    }

    let service = open_service(config_path, events_path)?;
    let mut constraints = service
        .constraints(duration)
        .with_required_participants(options.required_participant_ids.iter().cloned())
        .with_alternative_venues(options.alternative_venues.iter().cloned());
    if let Some(limit) = options.limit {
        if limit == 0 {
            return Err(CliError::InvalidLimit);
        }
        constraints = constraints.with_max_suggestions(limit);
    }
    if let Some(horizon_days) = options.horizon_days {
        constraints = constraints.with_horizon_days(horizon_days);
    }

    Ok(service.suggest_alternatives(&candidate, &constraints).await?)
}
