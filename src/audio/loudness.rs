//! Integrated loudness measurement (ITU-R BS.1770) and episode normalization.
//!
//! Normalization is a single global gain: the whole episode is measured once,
//! gained toward the target, then pulled down if the sample peak would exceed
//! the ceiling. The ceiling only ever lowers the gain.

use crate::audio::buffer::AudioBuffer;
use serde::Serialize;
use tracing::debug;

const BLOCK_SECS: f64 = 0.4;
const STEP_SECS: f64 = 0.1;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
const LOUDNESS_OFFSET: f64 = -0.691;

/// Outcome of a normalization pass, kept for reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessReport {
    /// Integrated loudness before gain; `None` for silent audio.
    pub measured_lufs: Option<f64>,
    pub target_lufs: f64,
    pub applied_gain_db: f64,
    /// True when the peak ceiling reduced the gain below what the target asked for.
    pub peak_limited: bool,
}

/// Second-order IIR section, transposed direct form II.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self {
            b0: b[0],
            b1: b[1],
            b2: b[2],
            a1: a[0],
            a2: a[1],
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

/// K-weighting filter pair (high shelf + high pass) for any sample rate.
///
/// Coefficients follow the analogue prototypes of BS.1770 through the bilinear
/// transform, so 48kHz reproduces the tabulated values.
fn k_weighting(sample_rate: u32) -> [Biquad; 2] {
    let rate = sample_rate as f64;

    let f0 = 1681.974450955533;
    let gain_db = 3.999843853973347;
    let q = 0.7071752369554196;
    let k = (std::f64::consts::PI * f0 / rate).tan();
    let vh = 10f64.powf(gain_db / 20.0);
    let vb = vh.powf(0.4996667741545416);
    let a0 = 1.0 + k / q + k * k;
    let shelf = Biquad::new(
        [
            (vh + vb * k / q + k * k) / a0,
            2.0 * (k * k - vh) / a0,
            (vh - vb * k / q + k * k) / a0,
        ],
        [2.0 * (k * k - 1.0) / a0, (1.0 - k / q + k * k) / a0],
    );

    let f0 = 38.13547087602444;
    let q = 0.5003270373238773;
    let k = (std::f64::consts::PI * f0 / rate).tan();
    let a0 = 1.0 + k / q + k * k;
    let high_pass = Biquad::new(
        [1.0, -2.0, 1.0],
        [2.0 * (k * k - 1.0) / a0, (1.0 - k / q + k * k) / a0],
    );

    [shelf, high_pass]
}

/// Integrated loudness in LUFS, or `None` if every block falls below the
/// absolute gate (silence).
///
/// Audio shorter than one 400ms block is measured as a single block.
pub fn integrated_loudness(buffer: &AudioBuffer) -> Option<f64> {
    let channels = buffer.channels as usize;
    let frames = buffer.frames();
    if frames == 0 || buffer.sample_rate == 0 {
        return None;
    }

    // Prefix sums of K-weighted power summed over channels (all weights 1.0).
    let mut filters: Vec<[Biquad; 2]> = (0..channels)
        .map(|_| k_weighting(buffer.sample_rate))
        .collect();
    let mut prefix = Vec::with_capacity(frames + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for frame in buffer.samples.chunks_exact(channels) {
        for (sample, filter) in frame.iter().zip(filters.iter_mut()) {
            let [shelf, high_pass] = filter;
            let weighted = high_pass.process(shelf.process(*sample as f64));
            acc += weighted * weighted;
        }
        prefix.push(acc);
    }

    let rate = buffer.sample_rate as f64;
    let block = ((BLOCK_SECS * rate).round() as usize).clamp(1, frames);
    let step = ((STEP_SECS * rate).round() as usize).max(1);

    let mut block_powers = Vec::new();
    let mut start = 0;
    while start + block <= frames {
        block_powers.push((prefix[start + block] - prefix[start]) / block as f64);
        start += step;
    }

    let to_lufs = |power: f64| LOUDNESS_OFFSET + 10.0 * power.log10();

    let gated: Vec<f64> = block_powers
        .into_iter()
        .filter(|&p| p > 0.0 && to_lufs(p) > ABSOLUTE_GATE_LUFS)
        .collect();
    if gated.is_empty() {
        return None;
    }

    let mean = |powers: &[f64]| powers.iter().sum::<f64>() / powers.len() as f64;
    let relative_gate = to_lufs(mean(&gated)) + RELATIVE_GATE_LU;

    let loud: Vec<f64> = gated
        .iter()
        .copied()
        .filter(|&p| to_lufs(p) > relative_gate)
        .collect();
    if loud.is_empty() {
        return Some(to_lufs(mean(&gated)));
    }

    Some(to_lufs(mean(&loud)))
}

/// Measure the buffer once and apply one gain toward `target_lufs`, capped so
/// the sample peak stays at or below `peak_ceiling_dbfs`.
pub fn normalize(
    buffer: &mut AudioBuffer,
    target_lufs: f64,
    peak_ceiling_dbfs: f64,
) -> LoudnessReport {
    let measured = integrated_loudness(buffer);

    let Some(measured_lufs) = measured else {
        debug!("Audio is silent, skipping loudness gain");
        return LoudnessReport {
            measured_lufs: None,
            target_lufs,
            applied_gain_db: 0.0,
            peak_limited: false,
        };
    };

    let mut gain = db_to_linear(target_lufs - measured_lufs);
    let mut peak_limited = false;

    let peak = buffer.peak() as f64;
    let ceiling = db_to_linear(peak_ceiling_dbfs);
    if peak > 0.0 && peak * gain > ceiling {
        gain = ceiling / peak;
        peak_limited = true;
    }

    buffer.apply_gain(gain as f32);

    let applied_gain_db = linear_to_db(gain);
    debug!(
        "Loudness {:.2} LUFS -> target {:.2} LUFS, gain {:+.2} dB{}",
        measured_lufs,
        target_lufs,
        applied_gain_db,
        if peak_limited { " (peak limited)" } else { "" }
    );

    LoudnessReport {
        measured_lufs: Some(measured_lufs),
        target_lufs,
        applied_gain_db,
        peak_limited,
    }
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

pub fn linear_to_db(gain: f64) -> f64 {
    20.0 * gain.log10()
}
