//! Dossier CLI - scheduling conflict checks from the terminal
//!
//! Check a candidate event against existing events, rank alternative slots,
//! and inspect the engine policy.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::check::run_check;
use crate::commands::common::resolve_config_path;
use crate::commands::completions::run_completions;
use crate::commands::policy::run_policy;
use crate::commands::suggest::{run_suggest, SuggestOptions};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "dossier=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Check {
            events,
            candidate,
            json,
        } => {
            run_check(events.as_deref(), &candidate, json, &config_path).await?;
        }
        Commands::Suggest {
            events,
            candidate,
            duration,
            required,
            venue_alt,
            limit,
            horizon_days,
            json,
        } => {
            let options = SuggestOptions {
                duration_minutes: duration,
                required_participant_ids: required,
                alternative_venues: venue_alt,
                limit,
                horizon_days,
            };
            run_suggest(events.as_deref(), &candidate, &options, json, &config_path).await?;
        }
        Commands::Policy { command } => run_policy(command, &config_path)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
