//! Episode data model: segments and the ordered plan.

use crate::error::{PodgenError, Result};
use crate::synthesis::synthesizer::SynthesizedSpeech;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Role of a segment within an episode, declared in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SegmentKind {
    IntroJingle,
    PromptVoice,
    Pause,
    ResponseVoice,
    OutroJingle,
}

impl SegmentKind {
    /// Canonical episode order.
    pub const CANONICAL: [SegmentKind; 5] = [
        SegmentKind::IntroJingle,
        SegmentKind::PromptVoice,
        SegmentKind::Pause,
        SegmentKind::ResponseVoice,
        SegmentKind::OutroJingle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::IntroJingle => "intro jingle",
            SegmentKind::PromptVoice => "prompt",
            SegmentKind::Pause => "pause",
            SegmentKind::ResponseVoice => "response",
            SegmentKind::OutroJingle => "outro jingle",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of speech to synthesize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueTurn {
    /// Script speaker, `None` for a plain-text response.
    pub speaker: Option<String>,
    pub text: String,
    pub voice: String,
}

impl DialogueTurn {
    pub fn new(speaker: Option<&str>, text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            speaker: speaker.map(str::to_string),
            text: text.into(),
            voice: voice.into(),
        }
    }
}

/// Where a segment's audio comes from.
#[derive(Debug, Clone)]
pub enum SegmentSource {
    /// Recorded or pre-rendered audio on disk.
    File(PathBuf),
    /// Text still to be synthesized, one entry per dialogue turn.
    Script(Vec<DialogueTurn>),
    /// Synthesized audio held in memory, one entry per turn.
    Synthesized(Vec<SynthesizedSpeech>),
    /// Generated digital silence.
    Silence(Duration),
}

/// An atomic audio unit of an episode.
#[derive(Debug, Clone)]
pub struct Segment {
    pub kind: SegmentKind,
    pub source: SegmentSource,
}

impl Segment {
    pub fn new(kind: SegmentKind, source: SegmentSource) -> Self {
        Self { kind, source }
    }
}

/// Ordered segments for one episode.
///
/// Valid plans follow `[IntroJingle?, PromptVoice, Pause?, ResponseVoice, OutroJingle?]`.
#[derive(Debug, Clone)]
pub struct EpisodePlan {
    segments: Vec<Segment>,
}

impl EpisodePlan {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn kinds(&self) -> Vec<SegmentKind> {
        self.segments.iter().map(|s| s.kind).collect()
    }

    pub fn contains(&self, kind: SegmentKind) -> bool {
        self.segments.iter().any(|s| s.kind == kind)
    }

    /// Check voice presence, canonical order, multiplicity and source types.
    ///
    /// # Errors
    /// - `EmptyPlan` when the prompt or the response is absent
    /// - `InvalidPlan` for duplicates, out-of-order segments or a source that
    ///   does not fit its kind
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [SegmentKind::PromptVoice, SegmentKind::ResponseVoice]
            .iter()
            .filter(|kind| !self.contains(**kind))
            .map(SegmentKind::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PodgenError::EmptyPlan {
                message: format!("missing {}", missing.join(" and ")),
            });
        }

        for kind in SegmentKind::CANONICAL {
            let count = self.segments.iter().filter(|s| s.kind == kind).count();
            if count > 1 {
                return Err(PodgenError::InvalidPlan {
                    message: format!("{kind} appears {count} times"),
                });
            }
        }

        for pair in self.segments.windows(2) {
            if pair[0].kind >= pair[1].kind {
                return Err(PodgenError::InvalidPlan {
                    message: format!("{} must not precede {}", pair[0].kind, pair[1].kind),
                });
            }
        }

        for segment in &self.segments {
            let fits = match (&segment.source, segment.kind) {
                (SegmentSource::Silence(_), SegmentKind::Pause) => true,
                (SegmentSource::Silence(_), _) | (_, SegmentKind::Pause) => false,
                (SegmentSource::File(_), _) => true,
                (SegmentSource::Script(_) | SegmentSource::Synthesized(_), kind) => {
                    kind == SegmentKind::ResponseVoice
                }
            };
            if !fits {
                return Err(PodgenError::InvalidPlan {
                    message: format!("{} has an incompatible audio source", segment.kind),
                });
            }
        }

        Ok(())
    }
}
