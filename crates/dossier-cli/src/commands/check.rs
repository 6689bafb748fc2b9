use std::path::Path;

use dossier_core::DetectionReport;

use crate::commands::common::{format_report_lines, open_service, read_candidate};
use crate::error::CliError;

pub async fn run_check(
    events_path: Option<&Path>,
    candidate_path: &Path,
    as_json: bool,
    config_path: &Path,
) -> Result<(), CliError> {
    let report = check_candidate(events_path, candidate_path, config_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn check_candidate(
    events_path: Option<&Path>,
    candidate_path: &Path,
    config_path: &Path,
) -> Result<DetectionReport, CliError> {
    let candidate = read_candidate(candidate_path)?;
    let service = open_service(config_path, events_path)?;
    Ok(service.check_conflicts(&candidate).await?)
}
