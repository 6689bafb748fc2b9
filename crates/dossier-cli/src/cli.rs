use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "dossier")]
#[command(about = "Check calendar conflicts and find alternative slots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine config file (JSON); defaults to the user config directory
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect conflicts for a candidate event
    Check {
        /// JSON array of existing events (Supabase is used when omitted)
        #[arg(long, value_name = "PATH")]
        events: Option<PathBuf>,
        /// JSON candidate event
        #[arg(long, value_name = "PATH")]
        candidate: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank alternative slots for a candidate event
    Suggest {
        /// JSON array of existing events (Supabase is used when omitted)
        #[arg(long, value_name = "PATH")]
        events: Option<PathBuf>,
        /// JSON candidate event
        #[arg(long, value_name = "PATH")]
        candidate: PathBuf,
        /// Slot length in minutes (defaults to the candidate's length)
        #[arg(long, value_name = "MINUTES")]
        duration: Option<i64>,
        /// Participants who must be free, comma separated
        #[arg(long, value_delimiter = ',', value_name = "IDS")]
        required: Vec<String>,
        /// Alternative venue to try at the original time (repeatable)
        #[arg(long = "venue-alt", value_name = "VENUE")]
        venue_alt: Vec<String>,
        /// Number of suggestions to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Days to search ahead
        #[arg(long, value_name = "DAYS")]
        horizon_days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or validate the engine policy
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Print the effective policy
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check an engine config file without using it
    Validate {
        /// Engine config file to check
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
