use std::path::Path;

use dossier_core::config::parse_engine_config;

use crate::cli::PolicyCommands;
use crate::commands::common::{format_policy_lines, load_engine_config};
use crate::error::CliError;

pub fn run_policy(command: PolicyCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        PolicyCommands::Show { json } => run_policy_show(json, config_path),
        PolicyCommands::Validate { path } => {
            validate_policy_file(&path)?;
            println!("{}: valid", path.display());
            Ok(())
        }
    }
}

fn run_policy_show(as_json: bool, config_path: &Path) -> Result<(), CliError> {
    let config = load_engine_config(config_path)?;
    if as_json {
        println!("{}", config.to_json_pretty()?);
    } else {
        println!("Config: {}", config_path.display());
        for line in format_policy_lines(&config) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Unlike loading, a missing file is an error here.
pub fn validate_policy_file(path: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    parse_engine_config(&raw)?;
    Ok(())
}
