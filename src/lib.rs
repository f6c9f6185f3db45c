//! podgen - podcast episode assembly
//!
//! Turns a recorded prompt and a text, script or audio response into one
//! loudness-normalized episode, with optional jingles and a pause.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod episode;
pub mod error;
pub mod pipeline;
pub mod synthesis;

// Composition root
#[cfg(feature = "cli")]
pub mod app;

// Episode model
pub use episode::{
    AssembledEpisode, Assembler, EpisodeInputs, EpisodePlan, EpisodeWriter, RenderedEpisode,
    ResponseInput, Segment, SegmentCollector, SegmentKind, SegmentSource, SegmentSpan,
};

// Synthesis
pub use synthesis::{HttpSynthesizer, MockSynthesizer, SpeechSynthesizer, SynthesisAdapter};

// Pipeline
pub use pipeline::{EpisodePipeline, EpisodeReport, EpisodeRequest, Stage, StageError};

// Error handling
pub use error::{ErrorKind, PodgenError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
