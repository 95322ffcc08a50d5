//! CLI argument definitions
//!
//! All Clap derive structs for `DuelJack` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Turn-based duel session engine for chat bots.
#[derive(Parser, Debug)]
#[command(name = "dueljack", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "DUELJACK_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "DUELJACK_LOG_FORMAT")]
    pub log_format: LogFormatChoice,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine, reading JSON intents from stdin.
    Run(RunArgs),

    /// Validate configuration files without starting the engine.
    Validate(ValidateArgs),

    /// Show one user's stats from the configured store.
    Stats(StatsArgs),

    /// Show the leaderboard from the configured store.
    Leaderboard(LeaderboardArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file. Built-in defaults when absent.
    #[arg(short, long, env = "DUELJACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "DUELJACK_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Write the duel event stream here, overriding `events.path`.
    #[arg(long, env = "DUELJACK_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// User id.
    pub user: u64,

    /// Path to YAML configuration file naming the stats store.
    #[arg(short, long, env = "DUELJACK_CONFIG")]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `leaderboard`.
#[derive(Args, Debug)]
pub struct LeaderboardArgs {
    /// Number of entries.
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Path to YAML configuration file naming the stats store.
    #[arg(short, long, env = "DUELJACK_CONFIG")]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormatChoice {
    /// Human-readable lines.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_without_config() {
        let cli = Cli::try_parse_from(["dueljack", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected RunArgs");
        };
        assert!(args.metrics_port.is_none());
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "dueljack",
            "-vv",
            "run",
            "--config",
            "duel.yaml",
            "--metrics-port",
            "9100",
            "--events-file",
            "events.jsonl",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("Expected RunArgs");
        };
        assert_eq!(args.config, Some(PathBuf::from("duel.yaml")));
        assert_eq!(args.metrics_port, Some(9100));
    }

    #[test]
    fn test_validate_requires_files() {
        assert!(Cli::try_parse_from(["dueljack", "validate"]).is_err());
        let cli = Cli::try_parse_from(["dueljack", "validate", "a.yaml", "b.yaml", "--strict"])
            .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("Expected ValidateArgs");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.strict);
    }

    #[test]
    fn test_leaderboard_defaults() {
        let cli = Cli::try_parse_from(["dueljack", "leaderboard", "--config", "c.yaml"]).unwrap();
        let Commands::Leaderboard(args) = cli.command else {
            panic!("Expected LeaderboardArgs");
        };
        assert_eq!(args.limit, 10);
        assert_eq!(args.format, OutputFormat::Human);
    }

    #[test]
    fn test_stats_rejects_non_numeric_user() {
        assert!(Cli::try_parse_from(["dueljack", "stats", "alice", "--config", "c.yaml"]).is_err());
    }

    #[test]
    fn test_help_output() {
        let err = Cli::try_parse_from(["dueljack", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_output() {
        let err = Cli::try_parse_from(["dueljack", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
