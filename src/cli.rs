//! CLI - Command Line Interface for RelayTV
//!
//! Every playback action is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # List channels
//! relaytv channels --category news --json
//!
//! # See which address the player would open
//! relaytv resolve bbc-news --proxy
//!
//! # Watch a channel in mpv with automatic proxy failover
//! relaytv play bbc-news
//!
//! # Dry run of the failover logic, no network involved
//! relaytv simulate bbc-news --fail-direct
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::stream::PlayerType;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// No channel with that id
    ChannelNotFound = 3,
    /// Channel has no source address
    NotPlayable = 4,
    /// Both direct and proxy playback failed
    PlaybackFailed = 5,
    /// Local player binary missing
    PlayerNotFound = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// RelayTV - live TV player with automatic proxy failover
///
/// Run without arguments to launch the interactive TUI.
/// Use subcommands for scriptable automation.
#[derive(Parser, Debug)]
#[command(
    name = "relaytv",
    version,
    about = "Live TV player with automatic direct/proxy failover",
    long_about = "Browse IPTV channels and play them. Streams that cannot be \
                  reached directly are rerouted through a proxy relay once \
                  before playback gives up.\n\n\
                  Run without arguments to launch the interactive TUI.\n\
                  Use subcommands for automation and scripting.",
    after_help = "EXAMPLES:\n\
                  relaytv                              Launch interactive TUI\n\
                  relaytv channels --playable          List playable channels\n\
                  relaytv play bbc-news                Play a channel\n\
                  relaytv simulate bbc-news --fail-direct   Dry run the failover"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Subcommand to run (omit for TUI mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Check if running in CLI mode (has subcommand)
    pub fn is_cli_mode(&self) -> bool {
        self.command.is_some()
    }

    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List channels in the catalog
    #[command(visible_alias = "ls")]
    Channels(ChannelsCmd),

    /// Show the address the player would open for a channel
    Resolve(ResolveCmd),

    /// Play a channel in a local player
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// Dry run of the playback state machine with scripted failures
    #[command(visible_alias = "sim")]
    Simulate(SimulateCmd),
}

// =============================================================================
// Channels Command
// =============================================================================

/// List channels, optionally filtered
#[derive(Args, Debug)]
pub struct ChannelsCmd {
    /// Only channels in this category
    #[arg(long, short = 'C')]
    pub category: Option<String>,

    /// Only channels with a source address
    #[arg(long)]
    pub playable: bool,
}

// =============================================================================
// Resolve Command
// =============================================================================

/// Print the address handed to the media engine
#[derive(Args, Debug)]
pub struct ResolveCmd {
    /// Channel id
    #[arg(required = true)]
    pub channel_id: String,

    /// Resolve through the proxy instead of directly
    #[arg(long)]
    pub proxy: bool,
}

// =============================================================================
// Play Command
// =============================================================================

/// Play a channel locally
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Channel id
    #[arg(required = true)]
    pub channel_id: String,

    /// Player to use (overrides config)
    #[arg(long, short = 'p', value_enum)]
    pub player: Option<PlayerChoice>,

    /// Seconds the player must stay up before it counts as playing
    #[arg(long, default_value = "3")]
    pub grace: u64,
}

/// Local player selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerChoice {
    /// mpv media player (default)
    #[default]
    Mpv,
    /// VLC media player
    Vlc,
}

impl From<PlayerChoice> for PlayerType {
    fn from(choice: PlayerChoice) -> Self {
        match choice {
            PlayerChoice::Mpv => PlayerType::Mpv,
            PlayerChoice::Vlc => PlayerType::Vlc,
        }
    }
}

// =============================================================================
// Simulate Command
// =============================================================================

/// Run the failover logic against a scripted engine
#[derive(Args, Debug)]
pub struct SimulateCmd {
    /// Channel id
    #[arg(required = true)]
    pub channel_id: String,

    /// Direct attempts fail
    #[arg(long)]
    pub fail_direct: bool,

    /// Proxy attempts fail
    #[arg(long)]
    pub fail_proxy: bool,

    /// Issue a manual retry after the run settles
    #[arg(long)]
    pub retry: bool,

    /// Reroute delay in milliseconds (overrides config)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Resolved address response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub channel_id: String,
    pub mode: String,
    pub url: String,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print one compact JSON line (for streamed state traces)
    pub fn print_line<T: Serialize>(&self, data: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(data)?);
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Channel ID Validation
// =============================================================================

/// Validate a channel id (non-empty, no whitespace)
pub fn validate_channel_id(id: &str) -> Result<&str, &'static str> {
    if !id.is_empty() && !id.chars().any(char::is_whitespace) {
        Ok(id)
    } else {
        Err("Invalid channel id (expected a non-empty id without spaces)")
    }
}

// =============================================================================
// Tests
// =============================================================================
