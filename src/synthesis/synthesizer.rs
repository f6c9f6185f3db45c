//! Speech synthesis trait and a scripted mock for tests.

use crate::audio::buffer::AudioBuffer;
use crate::audio::wav::encode_wav;
use crate::error::{PodgenError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A single text-to-speech request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

/// Encoded speech returned by a synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    /// Encoded audio file bytes (WAV from the synthesis service).
    pub audio: Vec<u8>,
    /// Duration the service reported for the audio, if any.
    pub reported_duration: Option<Duration>,
    /// Time the service spent generating, if reported.
    pub generation_time: Option<Duration>,
}

/// Trait for text-to-speech backends.
///
/// Lets the pipeline run against the HTTP service or a scripted mock.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Turn one request into encoded audio.
    ///
    /// # Errors
    /// `SynthesisTimeout`, `SynthesisUnavailable` or `SynthesisRejected`
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedSpeech>;

    /// Short backend description for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedSpeech> {
        (**self).synthesize(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Failure a [`MockSynthesizer`] can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Unavailable,
    Rejected,
}

impl MockFailure {
    fn to_error(self) -> PodgenError {
        match self {
            MockFailure::Timeout => PodgenError::SynthesisTimeout { timeout_secs: 0 },
            MockFailure::Unavailable => PodgenError::SynthesisUnavailable {
                message: "mock service unavailable".to_string(),
            },
            MockFailure::Rejected => PodgenError::SynthesisRejected {
                message: "mock rejected input".to_string(),
            },
        }
    }
}

/// Mock synthesizer for testing.
///
/// Returns a quiet 24kHz tone of a fixed duration for every request. Scripted
/// failures are returned first, in order, one per call.
#[derive(Debug)]
pub struct MockSynthesizer {
    speech_duration: Duration,
    sample_rate: u32,
    failures: Mutex<VecDeque<MockFailure>>,
    always_fail: Option<MockFailure>,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSynthesizer {
    /// Create a mock that answers every request with one second of tone.
    pub fn new() -> Self {
        Self {
            speech_duration: Duration::from_secs(1),
            sample_rate: 24000,
            failures: Mutex::new(VecDeque::new()),
            always_fail: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Configure the duration of every synthesized clip.
    pub fn with_speech_duration(mut self, duration: Duration) -> Self {
        self.speech_duration = duration;
        self
    }

    /// Configure the sample rate of synthesized clips.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Fail the next calls with these errors before succeeding.
    pub fn with_failures(self, failures: impl IntoIterator<Item = MockFailure>) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(failures);
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.always_fail = Some(failure);
        self
    }

    /// Number of `synthesize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn render_tone(&self) -> Result<Vec<u8>> {
        let frames = (self.speech_duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f64 / self.sample_rate as f64;
                ((2.0 * std::f64::consts::PI * 220.0 * t).sin() * 0.25) as f32
            })
            .collect();
        let buffer = AudioBuffer::new(samples, self.sample_rate, 1);
        encode_wav(&buffer).map_err(|e| PodgenError::Other(format!("mock WAV encoding failed: {e}")))
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedSpeech> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(failure) = self.always_fail {
            return Err(failure.to_error());
        }
        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(failure) = scripted {
            return Err(failure.to_error());
        }

        Ok(SynthesizedSpeech {
            audio: self.render_tone()?,
            reported_duration: Some(self.speech_duration),
            generation_time: Some(Duration::from_millis(10)),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
