//! CLI - Command Line Interface for TVHero
//!
//! Thin, scriptable front end over the resolution pipeline. Every command
//! can print JSON for automation.
//!
//! # Examples
//!
//! ```bash
//! # Describe what you want to watch
//! tvhero smart-search "סרט מדע בדיוני על חולות ותולעים ענקיות"
//!
//! # Direct catalog search, then open a title
//! tvhero search "מטריקס" --json
//! tvhero play 603 -t movie -Q 720p
//!
//! # Series episode with subtitles shifted by 1.5 seconds
//! tvhero play 1396 -t tv -s 1 -e 1
//! tvhero subtitles tt0903747 -s 1 -e 1
//! tvhero subtitle 123456 --offset 1.5 -o episode.vtt
//! ```

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::{CategoryFilter, MediaCategory};
use crate::stream::SubtitleSettings;

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
    /// Network error
    NetworkError = 3,
    /// No streams available
    NoStreams = 5,
    /// No user id configured
    NotSignedIn = 7,
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

/// TVHero - Hebrew movie and TV tracker
#[derive(Parser, Debug)]
#[command(
    name = "tvhero",
    version,
    about = "Hebrew movie and TV tracker",
    long_about = "Find titles from a free-text description or a direct search, \
                  keep personal libraries, and locate streams, trailers and \
                  synchronized Hebrew subtitles.",
    after_help = "EXAMPLES:\n\
                  tvhero smart-search \"קומדיה רומנטית בפריז\"   Describe a title\n\
                  tvhero search \"מטריקס\"                       Catalog search\n\
                  tvhero play 603 -t movie                     Locate streams\n\
                  tvhero status 603 --json                     Toggle watch status"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Signed-in user id
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    /// Default tracing directive for the verbosity flag
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a free-text description into titles
    #[command(visible_alias = "ss")]
    SmartSearch(SmartSearchCmd),

    /// Search the catalog by title
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Full bilingual details for a title
    #[command(visible_alias = "i")]
    Info(InfoCmd),

    /// Locate a trailer
    Trailer(TitleCmd),

    /// List the seasons of a series
    Seasons(SeasonsCmd),

    /// List the episodes of a season
    Episodes(EpisodesCmd),

    /// Locate streams for a movie or an episode
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// List Hebrew subtitle releases
    #[command(visible_alias = "subs")]
    Subtitles(SubtitlesCmd),

    /// Download and render one subtitle release
    #[command(visible_alias = "sub")]
    Subtitle(SubtitleCmd),

    /// Manage personal libraries
    #[command(visible_alias = "lib")]
    Library(LibraryCmd),

    /// Toggle watch status (none → watched → to-watch → none)
    Status(StatusCmd),

    /// Rate a title from 1 to 5
    Rate(RateCmd),
}

// =============================================================================
// Category Arguments
// =============================================================================

/// Category filter for searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FilterArg {
    Movie,
    Tv,
    #[default]
    All,
}

impl From<FilterArg> for CategoryFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Movie => CategoryFilter::Movie,
            FilterArg::Tv => CategoryFilter::Series,
            FilterArg::All => CategoryFilter::Any,
        }
    }
}

/// Category of a specific title
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Movie,
    Tv,
}

impl From<CategoryArg> for MediaCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Movie => MediaCategory::Movie,
            CategoryArg::Tv => MediaCategory::Series,
        }
    }
}

// =============================================================================
// Search Commands
// =============================================================================

/// Free-text smart search; replaces the smart search library
#[derive(Args, Debug)]
pub struct SmartSearchCmd {
    /// Description of what to watch
    #[arg(required = true)]
    pub query: String,

    /// Restrict to movies or series
    #[arg(long, short = 't', value_enum, default_value_t = FilterArg::All)]
    pub media_type: FilterArg,
}

/// Direct catalog search (at most ten results)
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Title or keywords
    #[arg(required = true)]
    pub query: String,

    /// Restrict to movies or series
    #[arg(long, short = 't', value_enum, default_value_t = FilterArg::All)]
    pub media_type: FilterArg,
}

/// Hydrate a catalog id
#[derive(Args, Debug)]
pub struct InfoCmd {
    /// Catalog id
    pub id: u64,

    #[arg(long, short = 't', value_enum)]
    pub media_type: CategoryArg,
}

/// A catalog id and its category
#[derive(Args, Debug)]
pub struct TitleCmd {
    /// Catalog id
    pub id: u64,

    #[arg(long, short = 't', value_enum)]
    pub media_type: CategoryArg,
}

// =============================================================================
// Series Navigation
// =============================================================================

#[derive(Args, Debug)]
pub struct SeasonsCmd {
    /// Series catalog id
    pub id: u64,
}

#[derive(Args, Debug)]
pub struct EpisodesCmd {
    /// Series catalog id
    pub id: u64,

    /// Season number (starting at 1)
    #[arg(long, short = 's')]
    pub season: u16,
}

// =============================================================================
// Play Command
// =============================================================================

/// Open a playback session and report its streams
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Catalog id
    pub id: u64,

    #[arg(long, short = 't', value_enum)]
    pub media_type: CategoryArg,

    /// Season number (series only)
    #[arg(long, short = 's')]
    pub season: Option<u16>,

    /// Episode number (series only)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,

    /// Resolution to attach instead of the default
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,
}

// =============================================================================
// Subtitle Commands
// =============================================================================

#[derive(Args, Debug)]
pub struct SubtitlesCmd {
    /// IMDB id (tt...)
    pub imdb_id: String,

    #[arg(long, short = 's', requires = "episode")]
    pub season: Option<u16>,

    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,
}

/// Load a release and render it with the given presentation
#[derive(Args, Debug)]
pub struct SubtitleCmd {
    /// Release id from `subtitles`
    pub release_id: String,

    /// Timing offset in seconds (may be negative)
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Keep leading punctuation in place
    #[arg(long)]
    pub no_flip: bool,

    #[arg(long)]
    pub font_size: Option<u16>,

    #[arg(long)]
    pub color: Option<String>,

    /// Vertical position in percent of the frame height
    #[arg(long)]
    pub position: Option<u8>,

    #[arg(long)]
    pub font: Option<String>,

    /// Write the rendered WebVTT to this file
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl SubtitleCmd {
    /// Overlay the flags on top of configured defaults
    pub fn settings(&self, base: &SubtitleSettings) -> SubtitleSettings {
        let mut settings = base.clone();
        if let Some(offset) = self.offset {
            settings.timing_offset_seconds = offset;
        }
        if self.no_flip {
            settings.flip_punctuation = false;
        }
        if let Some(size) = self.font_size {
            settings.font_size_px = size;
        }
        if let Some(color) = &self.color {
            settings.color = color.clone();
        }
        if let Some(position) = self.position {
            settings.vertical_position_percent = position;
        }
        if let Some(font) = &self.font {
            settings.font_family = font.clone();
        }
        settings
    }
}

// =============================================================================
// Library Commands
// =============================================================================

#[derive(Args, Debug)]
pub struct LibraryCmd {
    #[command(subcommand)]
    pub action: LibraryAction,
}

#[derive(Subcommand, Debug)]
pub enum LibraryAction {
    /// List library names, or the contents of one library
    #[command(visible_alias = "ls")]
    List {
        name: Option<String>,
    },

    /// Add a title to a library
    Add {
        name: String,
        id: u64,
        #[arg(long, short = 't', value_enum)]
        media_type: CategoryArg,
    },

    /// Remove a title from a library
    #[command(visible_alias = "rm")]
    Remove {
        name: String,
        id: u64,
        #[arg(long, short = 't', value_enum)]
        media_type: CategoryArg,
    },
}

#[derive(Args, Debug)]
pub struct StatusCmd {
    /// Catalog id
    pub id: u64,

    /// Show the current status without changing it
    #[arg(long)]
    pub show: bool,
}

#[derive(Args, Debug)]
pub struct RateCmd {
    /// Catalog id
    pub id: u64,

    /// Stars from 1 to 5; omit to show the stored rating
    pub rating: Option<u8>,
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
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Playback session report
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayResponse {
    pub title: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer: Option<String>,
    pub streams: Vec<StreamEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamEntry {
    pub resolution: String,
    pub url: String,
}

/// Rendered subtitle track
#[derive(Debug, Serialize, Deserialize)]
pub struct SubtitleResponse {
    pub handle: String,
    pub style: String,
    pub webvtt: String,
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

    /// Print success data as JSON, or `human` for terminals
    pub fn print<T: Serialize>(&self, data: T, human: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", human(&data));
        }
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
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    if id.starts_with("tt") && id.len() >= 9 && id[2..].chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err("Invalid IMDB ID format (expected tt followed by 7+ digits)")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_smart_search_defaults_to_all() {
        let cli = Cli::parse_from(["tvhero", "smart-search", "סרט על חלל"]);
        if let Command::SmartSearch(cmd) = cli.command {
            assert_eq!(cmd.query, "סרט על חלל");
            assert_eq!(CategoryFilter::from(cmd.media_type), CategoryFilter::Any);
        } else {
            panic!("Expected SmartSearch command");
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["tvhero", "-vv", "--json", "-u", "dana", "search", "dune"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.user.as_deref(), Some("dana"));
    }

    #[test]
    fn test_play_episode() {
        let cli = Cli::parse_from(["tvhero", "play", "1396", "-t", "tv", "-s", "2", "-e", "5", "-Q", "720p"]);
        if let Command::Play(cmd) = cli.command {
            assert_eq!(MediaCategory::from(cmd.media_type), MediaCategory::Series);
            assert_eq!(cmd.season, Some(2));
            assert_eq!(cmd.episode, Some(5));
            assert_eq!(cmd.quality.as_deref(), Some("720p"));
        } else {
            panic!("Expected Play command");
        }
    }

    #[test]
    fn test_episode_requires_season() {
        assert!(Cli::try_parse_from(["tvhero", "play", "1", "-t", "tv", "-e", "3"]).is_err());
    }

    #[test]
    fn test_subtitle_settings_overlay() {
        let cli = Cli::parse_from(["tvhero", "subtitle", "42", "--offset", "-1.5", "--no-flip", "--font-size", "30"]);
        if let Command::Subtitle(cmd) = cli.command {
            let settings = cmd.settings(&SubtitleSettings::default());
            assert_eq!(settings.timing_offset_seconds, -1.5);
            assert!(!settings.flip_punctuation);
            assert_eq!(settings.font_size_px, 30);
            assert_eq!(settings.color, "#FFFFFF");
        } else {
            panic!("Expected Subtitle command");
        }
    }

    #[test]
    fn test_validate_imdb_id() {
        assert!(validate_imdb_id("tt0903747").is_ok());
        assert!(validate_imdb_id("0903747").is_err());
        assert!(validate_imdb_id("tt12").is_err());
    }
}
