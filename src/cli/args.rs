//! CLI argument definitions
//!
//! All Clap derive structs for `fheguess` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::Overrides;
use crate::types::Address;

// ============================================================================
// Root CLI
// ============================================================================

/// Terminal client for the hourly encrypted number-guessing game.
#[derive(Parser, Debug)]
#[command(name = "fheguess", author, version, about)]
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
    #[arg(long, default_value = "auto", global = true, env = "FHEGUESS_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "FHEGUESS_LOG_FORMAT")]
    pub log_format: OutputFormat,

    /// Connection settings.
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Settings shared by every command that talks to the contract.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, global = true, env = "FHEGUESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the wallet or signing node.
    #[arg(long, global = true, env = "FHEGUESS_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Game contract address.
    #[arg(long, global = true, env = "FHEGUESS_CONTRACT")]
    pub contract: Option<Address>,

    /// Account to act as, when the endpoint exposes several.
    #[arg(long, global = true, env = "FHEGUESS_ACCOUNT")]
    pub account: Option<Address>,
}

impl ConnectionArgs {
    /// Flags that replace configuration file values.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            rpc_url: self.rpc_url.clone(),
            contract: self.contract,
            account: self.account,
        }
    }
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the clock, round state and available actions once.
    Status(StatusArgs),

    /// Follow the game live, accepting actions from stdin.
    Watch(WatchArgs),

    /// Submit a guess for the current round.
    Guess(GuessArgs),

    /// Start a new round (odd hours).
    StartRound(ActionArgs),

    /// Request the result reveal (even hours).
    Reveal(ActionArgs),

    /// Look up a past round.
    History(HistoryArgs),

    /// Show the game clock without contacting the contract.
    Clock(ClockArgs),

    /// Validate configuration files.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Write the JSONL event stream to this file.
    #[arg(long, env = "FHEGUESS_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "FHEGUESS_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Do not follow contract events; rely on polling only.
    #[arg(long)]
    pub no_events: bool,

    /// Override the refresh period (e.g. `500ms`, `2s`).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<std::time::Duration>,
}

/// Arguments for `guess`.
#[derive(Args, Debug)]
pub struct GuessArgs {
    /// Guessed number, 0 to 100.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub number: u8,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `start-round` and `reveal`.
#[derive(Args, Debug)]
pub struct ActionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Round number; defaults to the current round.
    pub round: Option<u8>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `clock`.
#[derive(Args, Debug)]
pub struct ClockArgs {
    /// Instant to evaluate instead of now (RFC 3339).
    #[arg(long, value_parser = parse_rfc3339)]
    pub at: Option<chrono::DateTime<chrono::FixedOffset>>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
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

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

fn parse_rfc3339(raw: &str) -> Result<chrono::DateTime<chrono::FixedOffset>, String> {
    chrono::DateTime::parse_from_rfc3339(raw).map_err(|e| format!("expected RFC 3339 time: {e}"))
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

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
