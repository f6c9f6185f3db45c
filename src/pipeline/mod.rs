//! Episode production pipeline.
//!
//! Runs the stages of one episode in order and reports which stage failed.
//! Batch processing of a prompt directory lives in [`queue`].

pub mod orchestrator;
pub mod queue;
pub mod stage;

pub use orchestrator::{
    EpisodeMetadata, EpisodePipeline, EpisodeReport, EpisodeRequest, metadata_path,
};
pub use queue::{QueueItem, QueueOutcome, QueueSummary, process_queue, scan_queue};
pub use stage::{LogObserver, RecordingObserver, Stage, StageError, StageObserver};
