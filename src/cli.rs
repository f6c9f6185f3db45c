//! Command-line interface for podgen
//!
//! Provides argument parsing using clap derive macros.

use clap::{ArgGroup, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Assemble podcast episodes from a recorded prompt and a synthesized response
#[derive(Parser, Debug)]
#[command(
    name = "podgen",
    version,
    about = "Assemble podcast episodes from a recorded prompt and a synthesized response",
    subcommand_negates_reqs = true,
    group(
        ArgGroup::new("response_source")
            .args(["response", "response_file", "script", "response_audio"])
    )
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Prompt recording (mp3, wav, m4a, ogg, flac)
    #[arg(value_name = "PROMPT", required = true)]
    pub prompt: Option<PathBuf>,

    /// Response text, read by the default voice
    #[arg(long, short = 'r', value_name = "TEXT")]
    pub response: Option<String>,

    /// File containing the response text
    #[arg(long, value_name = "PATH")]
    pub response_file: Option<PathBuf>,

    /// Dialogue script with `Speaker:` lines, read by the configured speakers
    #[arg(long, short = 's', value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Pre-synthesized response audio (skips speech synthesis)
    #[arg(long, value_name = "PATH")]
    pub response_audio: Option<PathBuf>,

    /// Only synthesize the first N dialogue turns (for testing scripts)
    #[arg(long, short = 'm', value_name = "N")]
    pub max_segments: Option<usize>,

    /// Episode name (default: episode_YYYYMMDD_HHMMSS)
    #[arg(long, short = 'n', value_name = "NAME")]
    pub name: Option<String>,

    /// Output file (default: <output dir>/<name>.wav)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the episode report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Per-run configuration overrides, shared by single-episode and queue mode.
#[derive(clap::Args, Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    /// Speech synthesis service URL (e.g., http://localhost:8880)
    #[arg(long, global = true, value_name = "URL")]
    pub tts_url: Option<String>,

    /// Voice for plain-text responses (e.g., am_adam, bf_emma)
    #[arg(long, global = true, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Pause between prompt and response. Examples: 1s, 1500ms, 0
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub pause: Option<Duration>,

    /// Synthesis timeout per request. Examples: 300, 5m
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Intro jingle
    #[arg(long, global = true, value_name = "PATH")]
    pub intro: Option<PathBuf>,

    /// Outro jingle
    #[arg(long, global = true, value_name = "PATH")]
    pub outro: Option<PathBuf>,

    /// Leave out configured jingles
    #[arg(long, global = true, conflicts_with_all = ["intro", "outro"])]
    pub no_jingles: bool,
}

/// Parse a duration argument.
///
/// Bare numbers are seconds (fractions allowed); anything else goes through
/// `humantime` (`30s`, `5m`, `1m30s`, `750ms`).
pub fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| e.to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce one episode per prompt in a queue directory
    Queue {
        /// Directory of prompts to process
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Where processed prompts are moved
        #[arg(long, value_name = "DIR")]
        done: Option<PathBuf>,

        /// Directory for rendered episodes (default: from config)
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Only synthesize the first N dialogue turns of each script
        #[arg(long, short = 'm', value_name = "N")]
        max_segments: Option<usize>,

        /// Print the queue summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List voices offered by the synthesis service
    Voices,

    /// Check configuration, jingles and the synthesis service
    Check,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, environment and flags applied)
    Show,
    /// Dump a commented configuration template
    Dump,
}
