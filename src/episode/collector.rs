//! Gathers episode inputs into an ordered [`EpisodePlan`].
//!
//! Collection only reads: it checks that referenced files exist and carry a
//! supported audio extension, loads response text, and never touches the
//! synthesis service.

use crate::config::{Config, EpisodeConfig, SynthesisConfig};
use crate::defaults::{SUPPORTED_EXTENSIONS, is_supported_extension};
use crate::episode::script::parse_script;
use crate::episode::segment::{DialogueTurn, EpisodePlan, Segment, SegmentKind, SegmentSource};
use crate::error::{PodgenError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the response comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseInput {
    /// Text read by the default voice.
    Text(String),
    /// File holding text read by the default voice.
    TextFile(PathBuf),
    /// Diarized dialogue script read by the configured speakers.
    Script(PathBuf),
    /// Pre-synthesized response audio.
    Audio(PathBuf),
}

/// Everything one episode needs besides configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeInputs {
    pub prompt: PathBuf,
    pub response: Option<ResponseInput>,
    /// Keep only the first N script turns.
    pub max_segments: Option<usize>,
}

impl EpisodeInputs {
    pub fn new(prompt: impl Into<PathBuf>, response: Option<ResponseInput>) -> Self {
        Self {
            prompt: prompt.into(),
            response,
            max_segments: None,
        }
    }

    pub fn with_max_segments(mut self, max_segments: Option<usize>) -> Self {
        self.max_segments = max_segments;
        self
    }
}

/// Builds episode plans from inputs and configuration.
pub struct SegmentCollector<'a> {
    episode: &'a EpisodeConfig,
    synthesis: &'a SynthesisConfig,
}

impl<'a> SegmentCollector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            episode: &config.episode,
            synthesis: &config.synthesis,
        }
    }

    /// Produce the plan `[IntroJingle?, PromptVoice, Pause?, ResponseVoice?, OutroJingle?]`.
    ///
    /// A missing or blank response leaves `ResponseVoice` out; assembly then
    /// refuses the plan as empty.
    ///
    /// # Errors
    /// - `MissingInput` when the prompt, a configured jingle or a response file is absent
    /// - `FormatMismatch` when an audio input has an unsupported extension
    pub fn collect(&self, inputs: &EpisodeInputs) -> Result<EpisodePlan> {
        let mut segments = Vec::with_capacity(5);

        if let Some(intro) = &self.episode.intro_jingle {
            require_audio_file(intro, "intro jingle")?;
            segments.push(Segment::new(
                SegmentKind::IntroJingle,
                SegmentSource::File(intro.clone()),
            ));
        }

        require_audio_file(&inputs.prompt, "prompt recording")?;
        segments.push(Segment::new(
            SegmentKind::PromptVoice,
            SegmentSource::File(inputs.prompt.clone()),
        ));

        let pause = self.episode.pause_duration();
        if !pause.is_zero() {
            segments.push(Segment::new(SegmentKind::Pause, SegmentSource::Silence(pause)));
        }

        match self.response_source(inputs)? {
            Some(source) => segments.push(Segment::new(SegmentKind::ResponseVoice, source)),
            None => warn!("No response content, episode has no response segment"),
        }

        if let Some(outro) = &self.episode.outro_jingle {
            require_audio_file(outro, "outro jingle")?;
            segments.push(Segment::new(
                SegmentKind::OutroJingle,
                SegmentSource::File(outro.clone()),
            ));
        }

        let plan = EpisodePlan::new(segments);
        debug!("Collected plan: {:?}", plan.kinds());
        Ok(plan)
    }

    fn response_source(&self, inputs: &EpisodeInputs) -> Result<Option<SegmentSource>> {
        let Some(response) = &inputs.response else {
            return Ok(None);
        };

        let turns = match response {
            ResponseInput::Audio(path) => {
                require_audio_file(path, "response audio")?;
                return Ok(Some(SegmentSource::File(path.clone())));
            }
            ResponseInput::Text(text) => self.plain_turns(text),
            ResponseInput::TextFile(path) => self.plain_turns(&read_text(path, "response text")?),
            ResponseInput::Script(path) => {
                let script = read_text(path, "response script")?;
                let mut turns = parse_script(&script, &self.synthesis.speakers);
                if let Some(limit) = inputs.max_segments
                    && turns.len() > limit
                {
                    debug!("Keeping first {} of {} dialogue turns", limit, turns.len());
                    turns.truncate(limit);
                }
                turns
            }
        };

        if turns.is_empty() {
            return Ok(None);
        }
        Ok(Some(SegmentSource::Script(turns)))
    }

    fn plain_turns(&self, text: &str) -> Vec<DialogueTurn> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        vec![DialogueTurn::new(None, text, self.synthesis.voice.clone())]
    }
}

/// Check that `path` is an existing file with a supported audio extension.
fn require_audio_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(PodgenError::MissingInput {
            what: what.to_string(),
            path: path.display().to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !is_supported_extension(extension) {
        return Err(PodgenError::format_mismatch(format!(
            "{what} {} has unsupported extension '{extension}' (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(())
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PodgenError::MissingInput {
                what: what.to_string(),
                path: path.display().to_string(),
            }
        } else {
            PodgenError::Io(e)
        }
    })
}
