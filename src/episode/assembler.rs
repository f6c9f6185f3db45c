//! Decodes, conforms and concatenates plan segments into one episode buffer.
//!
//! Every segment is converted to the reference format before joining, and
//! loudness normalization runs once over the finished episode so relative
//! levels between segments are preserved.

use crate::audio::buffer::AudioBuffer;
use crate::audio::decode::{decode_bytes, decode_file};
use crate::audio::loudness::{LoudnessReport, normalize};
use crate::audio::resample::to_format;
use crate::config::Config;
use crate::defaults;
use crate::episode::segment::{EpisodePlan, Segment, SegmentKind, SegmentSource};
use crate::error::{PodgenError, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Reference output format and loudness target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub target_lufs: f64,
    pub peak_ceiling_dbfs: f64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::OUTPUT_SAMPLE_RATE,
            channels: defaults::OUTPUT_CHANNELS,
            target_lufs: defaults::NORMALIZATION_TARGET_LUFS,
            peak_ceiling_dbfs: defaults::PEAK_CEILING_DBFS,
        }
    }
}

/// Where a segment landed in the episode timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentSpan {
    pub kind: SegmentKind,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// A fully assembled, normalized episode held in memory.
#[derive(Debug, Clone)]
pub struct AssembledEpisode {
    pub buffer: AudioBuffer,
    pub spans: Vec<SegmentSpan>,
    pub loudness: LoudnessReport,
}

impl AssembledEpisode {
    pub fn duration(&self) -> Duration {
        self.buffer.duration()
    }

    pub fn span(&self, kind: SegmentKind) -> Option<&SegmentSpan> {
        self.spans.iter().find(|s| s.kind == kind)
    }
}

/// Joins segments in plan order.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(AssemblerConfig {
            target_lufs: config.output.normalization_target_lufs,
            ..AssemblerConfig::default()
        })
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assemble a validated plan into one normalized buffer.
    ///
    /// Pure apart from reading referenced files: the same plan always yields
    /// the same samples.
    ///
    /// # Errors
    /// - `EmptyPlan` / `InvalidPlan` from plan validation
    /// - `FormatMismatch` when a segment cannot be decoded or converted
    /// - `MissingInput` when a referenced file vanished since collection
    pub fn assemble(&self, plan: &EpisodePlan) -> Result<AssembledEpisode> {
        plan.validate()?;

        let mut output =
            AudioBuffer::new(Vec::new(), self.config.sample_rate, self.config.channels);
        let mut spans = Vec::with_capacity(plan.segments().len());

        for segment in plan.segments() {
            let audio = self.render_segment(segment)?;
            debug!(
                "{}: {:.2}s at {:.2}s",
                segment.kind,
                audio.duration().as_secs_f64(),
                output.duration().as_secs_f64()
            );
            spans.push(SegmentSpan {
                kind: segment.kind,
                start_secs: output.duration().as_secs_f64(),
                duration_secs: audio.duration().as_secs_f64(),
            });
            output.append(&audio);
        }

        if output.is_empty() {
            return Err(PodgenError::EmptyPlan {
                message: "all segments decoded to zero length".to_string(),
            });
        }

        let loudness = normalize(
            &mut output,
            self.config.target_lufs,
            self.config.peak_ceiling_dbfs,
        );
        info!(
            "Assembled {} segments, {:.1}s total",
            spans.len(),
            output.duration().as_secs_f64()
        );

        Ok(AssembledEpisode {
            buffer: output,
            spans,
            loudness,
        })
    }

    fn render_segment(&self, segment: &Segment) -> Result<AudioBuffer> {
        match &segment.source {
            SegmentSource::Silence(duration) => Ok(AudioBuffer::silence(
                *duration,
                self.config.sample_rate,
                self.config.channels,
            )),
            SegmentSource::File(path) => self.conform(decode_file(path)?),
            SegmentSource::Synthesized(clips) => {
                let mut joined =
                    AudioBuffer::new(Vec::new(), self.config.sample_rate, self.config.channels);
                for (index, clip) in clips.iter().enumerate() {
                    let label = format!("{} turn {}", segment.kind, index + 1);
                    let decoded = decode_bytes(clip.audio.clone(), Some("wav"), &label)?;
                    joined.append(&self.conform(decoded)?);
                }
                Ok(joined)
            }
            SegmentSource::Script(_) => Err(PodgenError::InvalidPlan {
                message: format!("{} text has not been synthesized", segment.kind),
            }),
        }
    }

    fn conform(&self, buffer: AudioBuffer) -> Result<AudioBuffer> {
        to_format(buffer, self.config.sample_rate, self.config.channels)
    }
}
