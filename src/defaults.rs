//! Default configuration constants for podgen.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Reference sample rate of every assembled episode, in Hz.
///
/// All segments are resampled to this rate before concatenation. The rendered
/// file always uses it; it is not negotiated per run.
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Reference channel count of every assembled episode (mono).
pub const OUTPUT_CHANNELS: u16 = 1;

/// Bits per sample of the rendered WAV file.
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Default pause inserted between the prompt and the response, in seconds.
pub const PAUSE_DURATION_SECS: f64 = 1.0;

/// Default integrated loudness target in LUFS.
///
/// -16 LUFS is the common loudness target for spoken-word podcasts.
pub const NORMALIZATION_TARGET_LUFS: f64 = -16.0;

/// Sample-peak ceiling applied after loudness gain, in dBFS.
pub const PEAK_CEILING_DBFS: f64 = -1.0;

/// Base URL of the Kokoro-style synthesis service.
pub const SYNTHESIS_ENDPOINT: &str = "http://localhost:8880";

/// Default synthesis voice.
pub const DEFAULT_VOICE: &str = "am_adam";

/// Default speaking speed sent with every synthesis request.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Per-request synthesis timeout in seconds.
///
/// Cold starts of a GPU-backed service can take minutes, so this is generous.
pub const SYNTHESIS_TIMEOUT_SECS: u64 = 300;

/// Retries after the first failed synthesis attempt (transient errors only).
pub const SYNTHESIS_MAX_RETRIES: u32 = 3;

/// Initial backoff between synthesis retries, in milliseconds. Doubles per retry.
pub const SYNTHESIS_BACKOFF_MS: u64 = 500;

/// Upper bound on a single backoff sleep, in milliseconds.
pub const SYNTHESIS_MAX_BACKOFF_MS: u64 = 10_000;

/// Default host speaker name and voice for dialogue scripts.
pub const HOST_NAME: &str = "Herman";
pub const HOST_VOICE: &str = "am_adam";

/// Default co-host speaker name and voice for dialogue scripts.
pub const CO_HOST_NAME: &str = "Emma";
pub const CO_HOST_VOICE: &str = "bf_emma";

/// Directory rendered episodes land in when no output path is given.
pub const OUTPUT_DIR: &str = "episodes";

/// Queue directories used by `podgen queue`.
pub const QUEUE_TO_PROCESS_DIR: &str = "prompts/to-process";
pub const QUEUE_DONE_DIR: &str = "prompts/done";

/// Audio file extensions accepted as prompt recordings and jingles.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a"];

/// Check whether a file extension (without dot, any case) is a supported audio format.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(ext))
}
