//! Turns response text into speech, with retries for transient failures.

use crate::config::SynthesisConfig;
use crate::episode::segment::{DialogueTurn, SegmentSource};
use crate::error::{PodgenError, Result};
use crate::synthesis::synthesizer::{SpeechSynthesizer, SynthesisRequest, SynthesizedSpeech};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Exponential backoff for retryable synthesis failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SynthesisConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Per-turn synthesis record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnStats {
    pub speaker: Option<String>,
    pub voice: String,
    pub characters: usize,
    pub attempts: u32,
    pub generation_secs: Option<f64>,
    pub audio_secs: Option<f64>,
}

/// Synthesis work done for one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SynthesisStats {
    pub turns: Vec<TurnStats>,
    /// Service calls, including retries.
    pub attempts: u32,
    pub elapsed_secs: f64,
    /// Sum of service-reported generation times.
    pub generation_secs: f64,
    /// Generation time over audio duration, when the service reports both.
    pub realtime_factor: Option<f64>,
    /// Distinct voices, in order of first use.
    pub voices: Vec<String>,
}

impl SynthesisStats {
    fn summarize(&mut self) {
        self.generation_secs = self.turns.iter().filter_map(|t| t.generation_secs).sum();
        let audio_secs: f64 = self.turns.iter().filter_map(|t| t.audio_secs).sum();
        self.realtime_factor = (audio_secs > 0.0 && self.generation_secs > 0.0)
            .then(|| self.generation_secs / audio_secs);
        self.voices.clear();
        for turn in &self.turns {
            if !self.voices.contains(&turn.voice) {
                self.voices.push(turn.voice.clone());
            }
        }
    }
}

/// Wraps a [`SpeechSynthesizer`] with retry and bookkeeping.
pub struct SynthesisAdapter<S> {
    synthesizer: S,
    policy: RetryPolicy,
    speed: f32,
    attempts: AtomicU32,
}

impl<S: SpeechSynthesizer> SynthesisAdapter<S> {
    pub fn new(synthesizer: S, policy: RetryPolicy, speed: f32) -> Self {
        Self {
            synthesizer,
            policy,
            speed,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn from_config(synthesizer: S, config: &SynthesisConfig) -> Self {
        Self::new(synthesizer, RetryPolicy::from_config(config), config.speed)
    }

    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Service calls made through this adapter so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Resolve a response source into audio.
    ///
    /// Scripts are synthesized turn by turn; audio already on disk or in
    /// memory passes through without touching the service.
    pub async fn resolve(&self, source: SegmentSource) -> Result<(SegmentSource, SynthesisStats)> {
        match source {
            SegmentSource::Script(turns) => {
                let (speech, stats) = self.synthesize_turns(&turns).await?;
                Ok((SegmentSource::Synthesized(speech), stats))
            }
            other => {
                debug!("Response audio provided, skipping synthesis");
                Ok((other, SynthesisStats::default()))
            }
        }
    }

    /// Synthesize each turn in order.
    ///
    /// # Errors
    /// The first turn that still fails after retries aborts the whole batch.
    pub async fn synthesize_turns(
        &self,
        turns: &[DialogueTurn],
    ) -> Result<(Vec<SynthesizedSpeech>, SynthesisStats)> {
        if turns.is_empty() {
            return Err(PodgenError::EmptyPlan {
                message: "response has no text to synthesize".to_string(),
            });
        }

        let started = Instant::now();
        let mut speech = Vec::with_capacity(turns.len());
        let mut stats = SynthesisStats::default();

        for (index, turn) in turns.iter().enumerate() {
            info!(
                "[{}/{}] Synthesizing {} ({} chars, voice {})",
                index + 1,
                turns.len(),
                turn.speaker.as_deref().unwrap_or("response"),
                turn.text.chars().count(),
                turn.voice
            );

            let request = SynthesisRequest {
                text: turn.text.clone(),
                voice: turn.voice.clone(),
                speed: self.speed,
            };
            let (clip, attempts) = self.synthesize_with_retry(&request).await?;

            stats.attempts += attempts;
            stats.turns.push(TurnStats {
                speaker: turn.speaker.clone(),
                voice: turn.voice.clone(),
                characters: turn.text.chars().count(),
                attempts,
                generation_secs: clip.generation_time.map(|d| d.as_secs_f64()),
                audio_secs: clip.reported_duration.map(|d| d.as_secs_f64()),
            });
            speech.push(clip);
        }

        stats.elapsed_secs = started.elapsed().as_secs_f64();
        stats.summarize();
        info!(
            "Synthesized {} turns in {:.1}s ({} service calls)",
            turns.len(),
            stats.elapsed_secs,
            stats.attempts
        );
        Ok((speech, stats))
    }

    /// Send one request, retrying timeouts and unavailability with backoff.
    ///
    /// Returns the speech and the number of attempts it took.
    pub async fn synthesize_with_retry(
        &self,
        request: &SynthesisRequest,
    ) -> Result<(SynthesizedSpeech, u32)> {
        if request.text.trim().is_empty() {
            return Err(PodgenError::SynthesisRejected {
                message: "empty text".to_string(),
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.attempts.fetch_add(1, Ordering::SeqCst);

            match self.synthesizer.synthesize(request).await {
                Ok(speech) => {
                    if let Some(generation) = speech.generation_time {
                        debug!("Generated in {:.2}s", generation.as_secs_f64());
                    }
                    return Ok((speech, attempt));
                }
                Err(e) if e.is_retryable() && attempt <= self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Synthesis attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.policy.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
