//! In-memory PCM buffer shared by decoding, assembly and output.

use std::time::Duration;

/// Interleaved f32 PCM audio with its format.
///
/// Samples are nominally in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Digital silence of the given length.
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Self {
        let frames = frames_for(duration, sample_rate);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Absolute sample peak.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Append another buffer of the same format.
    ///
    /// Callers convert formats first; the assembler guarantees this.
    pub fn append(&mut self, other: &AudioBuffer) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        debug_assert_eq!(self.channels, other.channels);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Multiply every sample by a linear gain.
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }
}

/// Frame count for a duration at a sample rate, rounded to the nearest frame.
pub fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}
