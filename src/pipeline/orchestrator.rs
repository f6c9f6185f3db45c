//! Drives one episode through collect, synthesize, assemble and write.
//!
//! The Writing stage produces the episode audio and a `<name>.json` metadata
//! file next to it. Either both land or neither does.

use crate::config::Config;
use crate::episode::assembler::{Assembler, SegmentSpan};
use crate::episode::collector::{EpisodeInputs, SegmentCollector};
use crate::episode::segment::{EpisodePlan, Segment, SegmentKind};
use crate::episode::writer::{EpisodeWriter, RenderedEpisode};
use crate::error::PodgenError;
use crate::pipeline::stage::{LogObserver, Stage, StageError, StageObserver};
use crate::synthesis::adapter::{SynthesisAdapter, SynthesisStats};
use crate::synthesis::synthesizer::SpeechSynthesizer;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// One episode to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRequest {
    pub name: String,
    pub inputs: EpisodeInputs,
    pub output_path: PathBuf,
}

/// Summary of a finished episode, printed by the CLI and as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReport {
    pub name: String,
    pub episode: RenderedEpisode,
    pub metadata_path: PathBuf,
    pub segments: Vec<SegmentSpan>,
    pub peak_limited: bool,
    pub synthesis: SynthesisStats,
    pub stages: Vec<Stage>,
    pub elapsed_secs: f64,
}

/// Contents of the metadata file written beside each episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeMetadata {
    pub episode_name: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    pub audio_file: String,
    /// Synthesized dialogue turns.
    pub segments_count: usize,
    pub voices: Vec<String>,
    pub total_tts_secs: f64,
    pub avg_tts_secs: Option<f64>,
    pub audio_duration_secs: f64,
    pub realtime_factor: Option<f64>,
    pub measured_loudness_lufs: Option<f64>,
    pub applied_gain_db: f64,
    pub segments: Vec<SegmentSpan>,
}

impl EpisodeMetadata {
    pub fn new(
        name: &str,
        episode: &RenderedEpisode,
        segments: &[SegmentSpan],
        synthesis: &SynthesisStats,
    ) -> Self {
        let turns = synthesis.turns.len();
        Self {
            episode_name: name.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            audio_file: episode
                .audio_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            segments_count: turns,
            voices: synthesis.voices.clone(),
            total_tts_secs: synthesis.generation_secs,
            avg_tts_secs: (turns > 0).then(|| synthesis.generation_secs / turns as f64),
            audio_duration_secs: episode.total_duration_secs,
            realtime_factor: synthesis.realtime_factor,
            measured_loudness_lufs: episode.measured_loudness_lufs,
            applied_gain_db: episode.applied_gain_db,
            segments: segments.to_vec(),
        }
    }
}

/// `episode.wav` -> `episode.json`; an output already named `.json` gets `.metadata.json`.
pub fn metadata_path(output_path: &Path) -> PathBuf {
    if output_path.extension().is_some_and(|ext| ext == "json") {
        output_path.with_extension("metadata.json")
    } else {
        output_path.with_extension("json")
    }
}

/// Episode pipeline.
///
/// Stages run strictly in order; the first error ends the run in
/// [`Stage::Failed`] and no output file is created.
pub struct EpisodePipeline<S> {
    config: Config,
    adapter: SynthesisAdapter<S>,
    assembler: Assembler,
    observer: Arc<dyn StageObserver>,
}

impl<S: SpeechSynthesizer> EpisodePipeline<S> {
    pub fn new(config: Config, synthesizer: S) -> Self {
        let adapter = SynthesisAdapter::from_config(synthesizer, &config.synthesis);
        let assembler = Assembler::from_config(&config);
        Self {
            config,
            adapter,
            assembler,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replace the synthesis adapter, e.g. to change the retry policy.
    pub fn with_adapter(mut self, adapter: SynthesisAdapter<S>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn adapter(&self) -> &SynthesisAdapter<S> {
        &self.adapter
    }

    /// Run every stage for `request`.
    ///
    /// # Errors
    /// A [`StageError`] naming the stage that failed and the error kind.
    pub async fn run(&self, request: &EpisodeRequest) -> Result<EpisodeReport, StageError> {
        let started = Instant::now();
        let mut run = Run {
            name: &request.name,
            observer: self.observer.as_ref(),
            stages: Vec::with_capacity(5),
        };

        run.enter(Stage::Collecting);
        let plan = run.check(SegmentCollector::new(&self.config).collect(&request.inputs))?;

        run.enter(Stage::Synthesizing);
        let (plan, synthesis) = run.check(self.synthesize(plan).await)?;

        run.enter(Stage::Assembling);
        let assembled = run.check(self.assembler.assemble(&plan))?;

        run.enter(Stage::Writing);
        let episode = run.check(EpisodeWriter::write(&assembled, &request.output_path))?;
        let metadata = EpisodeMetadata::new(&request.name, &episode, &assembled.spans, &synthesis);
        let metadata_path = metadata_path(&request.output_path);
        let written = EpisodeWriter::write_metadata(&metadata, &metadata_path);
        if written.is_err() {
            if let Err(e) = fs::remove_file(&episode.audio_path) {
                warn!("Could not remove {}: {}", episode.audio_path.display(), e);
            }
        }
        run.check(written)?;

        run.enter(Stage::Done);
        Ok(EpisodeReport {
            name: request.name.clone(),
            episode,
            metadata_path,
            segments: assembled.spans,
            peak_limited: assembled.loudness.peak_limited,
            synthesis,
            stages: run.stages,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    async fn synthesize(
        &self,
        plan: EpisodePlan,
    ) -> Result<(EpisodePlan, SynthesisStats), PodgenError> {
        let mut stats = SynthesisStats::default();
        let mut segments = Vec::with_capacity(plan.segments().len());

        for segment in plan.into_segments() {
            if segment.kind == SegmentKind::ResponseVoice {
                let (source, turn_stats) = self.adapter.resolve(segment.source).await?;
                stats = turn_stats;
                segments.push(Segment::new(segment.kind, source));
            } else {
                segments.push(segment);
            }
        }

        Ok((EpisodePlan::new(segments), stats))
    }
}

/// Stage bookkeeping for a single run.
struct Run<'a> {
    name: &'a str,
    observer: &'a dyn StageObserver,
    stages: Vec<Stage>,
}

impl Run<'_> {
    fn enter(&mut self, stage: Stage) {
        self.stages.push(stage);
        self.observer.on_stage(self.name, stage);
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Collecting)
    }

    fn check<T>(&mut self, result: Result<T, PodgenError>) -> Result<T, StageError> {
        result.map_err(|source| {
            let error = StageError::new(self.current(), source);
            self.stages.push(Stage::Failed);
            self.observer.on_stage(self.name, Stage::Failed);
            self.observer.on_failure(self.name, &error);
            error
        })
    }
}
