//! CLI argument definitions for wxmerge.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Aggregate one airport once and print the merged snapshot |
//! | `sources` | List supported source types and their capabilities |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `wxmerge.json` | Airport configuration file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `warn` | Log verbosity on stderr |
//!
//! # Examples
//!
//! ```bash
//! wxmerge --config airports.json fetch --airport KSPB --pretty
//! wxmerge sources --verbose
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::Level;

const DEFAULT_CONFIG_PATH: &str = "wxmerge.json";
const DEFAULT_LOG_LEVEL: Level = Level::WARN;

/// Airport weather aggregation across heterogeneous upstream sources.
#[derive(Debug, Parser)]
#[command(name = "wxmerge", author, version, about)]
pub struct Cli {
    /// Path to the JSON airport configuration.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive). Logs go to stderr.
    #[arg(long, global = true, default_value_t = DEFAULT_LOG_LEVEL)]
    pub log_level: Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every configured source of an airport and print the merged result.
    Fetch(FetchArgs),
    /// List supported source types.
    Sources(SourcesArgs),
}

/// Arguments for the `fetch` command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Airport identifier as configured (case insensitive).
    #[arg(long)]
    pub airport: String,

    /// Exit with code 3 when the merged result fails closed.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

/// Arguments for the `sources` command.
#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Include the full field list of each source.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_with_global_options() {
        let cli = Cli::try_parse_from([
            "wxmerge",
            "fetch",
            "--airport",
            "KSPB",
            "--config",
            "airports.json",
            "--log-level",
            "debug",
            "--pretty",
        ])
        .expect("valid arguments");

        assert_eq!(cli.config, PathBuf::from("airports.json"));
        assert_eq!(cli.log_level, Level::DEBUG);
        assert!(cli.pretty);
        match cli.command {
            Command::Fetch(args) => {
                assert_eq!(args.airport, "KSPB");
                assert!(!args.strict);
            }
            Command::Sources(_) => panic!("expected fetch"),
        }
    }

    #[test]
    fn fetch_requires_an_airport() {
        assert!(Cli::try_parse_from(["wxmerge", "fetch"]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let cli = Cli::try_parse_from(["wxmerge", "sources"]).expect("valid arguments");
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.log_level, Level::WARN);
    }
}
