//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// uc - poll one endpoint, fan updates out to many observers
#[derive(Debug, Parser)]
#[command(
    name = "uc",
    about = "Polling update coordinator for JSON endpoints",
    version,
    after_help = "With --log-file, logs are written to: ~/.local/share/uc/logs/uc.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long = "log-file", global = true)]
    pub log_file: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the endpoint and print every update until Ctrl+C
    Watch {
        /// Endpoint URL (overrides source.url)
        #[arg(short, long)]
        url: Option<String>,

        /// Seconds between refreshes (overrides coordinator.update-interval-secs)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after the first refresh
        #[arg(long)]
        once: bool,
    },

    /// Refresh once and print the snapshot or the failure
    Fetch {
        /// Endpoint URL (overrides source.url)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("uc")
        .join("logs")
        .join("uc.log");
    debug!(?path, "get_log_path: called");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from(["uc", "-l", "debug", "watch", "--url", "http://x/", "--interval", "5", "--once"])
            .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Watch { url, interval, once } => {
                assert_eq!(url.as_deref(), Some("http://x/"));
                assert_eq!(interval, Some(5));
                assert!(once);
            }
            other => panic!("Wrong command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["uc", "config", "--config", "/tmp/uc.yml", "--log-file"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/uc.yml")));
        assert!(cli.log_file);
        assert!(matches!(cli.command, Command::Config));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("uc/logs/uc.log"));
    }
}
