//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Extract Pipedrive CRM data into DuckDB, incrementally
#[derive(Parser, Debug)]
#[command(name = "pipedrive-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline: built-in name or YAML file
    #[arg(short, long, global = true, default_value = "pipedrive")]
    pub pipeline: PathBuf,

    /// State file (JSON)
    #[arg(short, long, global = true, default_value = ".pipedrive-extract/state.json")]
    pub state: PathBuf,

    /// Keep state in memory only; nothing is read or written
    #[arg(long, global = true)]
    pub no_state: bool,

    /// DuckDB database file
    #[arg(short, long, global = true, default_value = "pipedrive.duckdb")]
    pub database: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract endpoints and load them into the database
    Run {
        /// Endpoints to run (comma-separated, empty = all)
        #[arg(short, long, value_delimiter = ',')]
        endpoints: Vec<String>,

        /// Read the API token from this environment variable
        #[arg(long, conflicts_with = "credential_file")]
        credential_env: Option<String>,

        /// Read the API token from this file
        #[arg(long)]
        credential_file: Option<PathBuf>,

        /// Endpoints extracted at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Abort endpoints still running after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Load into memory instead of the database file
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the pipeline definition
    Validate,

    /// List endpoints of the pipeline
    Endpoints,

    /// Inspect or reset saved watermarks
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

/// State subcommands
#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Show saved state
    Show {
        /// Only this endpoint
        endpoint: Option<String>,
    },

    /// Forget saved state so the next run starts from the initial value
    Reset {
        /// Endpoint to reset
        #[arg(required_unless_present = "all")]
        endpoint: Option<String>,

        /// Reset every endpoint
        #[arg(long, conflicts_with = "endpoint")]
        all: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned text
    Table,
    /// Pretty-printed JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "pipedrive-extract",
            "--format",
            "json",
            "run",
            "--endpoints",
            "deals,persons",
            "--timeout",
            "600",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.pipeline, PathBuf::from("pipedrive"));
        match cli.command {
            Commands::Run {
                endpoints, timeout, ..
            } => {
                assert_eq!(endpoints, vec!["deals", "persons"]);
                assert_eq!(timeout, Some(600));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_state_reset_requires_target() {
        assert!(Cli::try_parse_from(["pipedrive-extract", "state", "reset"]).is_err());
        assert!(Cli::try_parse_from(["pipedrive-extract", "state", "reset", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["pipedrive-extract", "state", "reset", "deals"]).is_ok());
    }
}
