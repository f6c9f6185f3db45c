//! Pipeline stages, stage-tagged errors and stage observers.

use crate::error::{ErrorKind, PodgenError};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

/// Lifecycle of one episode run.
///
/// `Collecting -> Synthesizing -> Assembling -> Writing -> Done`, with any
/// stage able to move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Collecting,
    Synthesizing,
    Assembling,
    Writing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collecting => "collecting",
            Stage::Synthesizing => "synthesizing",
            Stage::Assembling => "assembling",
            Stage::Writing => "writing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error together with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage} failed [{kind}]: {source}", kind = .source.kind())]
pub struct StageError {
    pub stage: Stage,
    pub source: PodgenError,
}

impl StageError {
    pub fn new(stage: Stage, source: PodgenError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Receives stage transitions as an episode progresses.
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, episode: &str, stage: Stage);

    fn on_failure(&self, _episode: &str, _error: &StageError) {}
}

/// Observer that logs transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn on_stage(&self, episode: &str, stage: Stage) {
        info!("[{}] {}", episode, stage);
    }

    fn on_failure(&self, episode: &str, error: &StageError) {
        warn!("[{}] {}", episode, error);
    }
}

/// Observer that keeps every transition, for tests and reports.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    stages: Mutex<Vec<Stage>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StageObserver for RecordingObserver {
    fn on_stage(&self, _episode: &str, stage: Stage) {
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stage);
    }
}
