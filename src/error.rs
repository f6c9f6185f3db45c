//! Error types for podgen.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodgenError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Input collection errors
    #[error("Missing {what}: {path}")]
    MissingInput { what: String, path: String },

    // Synthesis errors
    #[error("Speech synthesis timed out after {timeout_secs}s")]
    SynthesisTimeout { timeout_secs: u64 },

    #[error("Speech synthesis rejected input: {message}")]
    SynthesisRejected { message: String },

    #[error("Speech synthesis service unavailable: {message}")]
    SynthesisUnavailable { message: String },

    // Assembly errors
    #[error("Audio format mismatch: {message}")]
    FormatMismatch { message: String },

    #[error("Episode plan has no voice content: {message}")]
    EmptyPlan { message: String },

    #[error("Invalid episode plan: {message}")]
    InvalidPlan { message: String },

    // Output errors
    #[error("Failed to write episode to {path}: {message}")]
    Write { path: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`PodgenError`], reported on the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    MissingInput,
    SynthesisTimeout,
    SynthesisRejected,
    SynthesisUnavailable,
    FormatMismatch,
    EmptyPlan,
    InvalidPlan,
    Write,
    Io,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::MissingInput => "MissingInputError",
            ErrorKind::SynthesisTimeout => "SynthesisTimeout",
            ErrorKind::SynthesisRejected => "SynthesisRejected",
            ErrorKind::SynthesisUnavailable => "SynthesisUnavailable",
            ErrorKind::FormatMismatch => "FormatMismatchError",
            ErrorKind::EmptyPlan => "EmptyPlanError",
            ErrorKind::InvalidPlan => "InvalidPlanError",
            ErrorKind::Write => "WriteError",
            ErrorKind::Io => "IoError",
            ErrorKind::Other => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PodgenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PodgenError::ConfigParse { .. } | PodgenError::ConfigInvalidValue { .. } => {
                ErrorKind::Config
            }
            PodgenError::MissingInput { .. } => ErrorKind::MissingInput,
            PodgenError::SynthesisTimeout { .. } => ErrorKind::SynthesisTimeout,
            PodgenError::SynthesisRejected { .. } => ErrorKind::SynthesisRejected,
            PodgenError::SynthesisUnavailable { .. } => ErrorKind::SynthesisUnavailable,
            PodgenError::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            PodgenError::EmptyPlan { .. } => ErrorKind::EmptyPlan,
            PodgenError::InvalidPlan { .. } => ErrorKind::InvalidPlan,
            PodgenError::Write { .. } => ErrorKind::Write,
            PodgenError::Io(_) => ErrorKind::Io,
            PodgenError::Other(_) => ErrorKind::Other,
        }
    }

    /// Transient synthesis failures worth another attempt.
    ///
    /// Rejections are input problems and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SynthesisTimeout | ErrorKind::SynthesisUnavailable
        )
    }

    /// Shorthand for a [`PodgenError::FormatMismatch`] with a formatted message.
    pub fn format_mismatch(message: impl Into<String>) -> Self {
        PodgenError::FormatMismatch {
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PodgenError>;
