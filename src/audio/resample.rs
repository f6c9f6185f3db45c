//! Format conversion to the episode reference format.
//!
//! Channel layout is remixed first (downmix by averaging, upmix by duplication),
//! then the sample rate is converted with rubato. Output length is exactly
//! `round(frames * to / from)` so segment durations survive conversion.

use crate::audio::buffer::AudioBuffer;
use crate::error::{PodgenError, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Input frames handed to rubato per call.
const CHUNK_FRAMES: usize = 4096;

/// Convert a buffer to the given sample rate and channel count.
///
/// Buffers already in the target format are returned unchanged.
pub fn to_format(buffer: AudioBuffer, sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if buffer.sample_rate == 0 || buffer.channels == 0 {
        return Err(PodgenError::format_mismatch(format!(
            "cannot convert audio with {}Hz x{} channels",
            buffer.sample_rate, buffer.channels
        )));
    }

    if buffer.sample_rate == sample_rate && buffer.channels == channels {
        return Ok(buffer);
    }

    let source_rate = buffer.sample_rate;
    let planar = remix(&deinterleave(&buffer.samples, buffer.channels), channels);

    let planar = if source_rate == sample_rate {
        planar
    } else {
        debug!(
            "Resampling {} frames from {}Hz to {}Hz ({} channels)",
            planar[0].len(),
            source_rate,
            sample_rate,
            channels
        );
        resample_planar(planar, source_rate, sample_rate)?
    };

    Ok(AudioBuffer::new(interleave(planar), sample_rate, channels))
}

/// Remix planar channels to `channels` outputs.
fn remix(planar: &[Vec<f32>], channels: u16) -> Vec<Vec<f32>> {
    let target = channels as usize;
    if planar.len() == target {
        return planar.to_vec();
    }

    let frames = planar.first().map_or(0, Vec::len);
    let mono: Vec<f32> = if planar.len() == 1 {
        planar[0].clone()
    } else {
        let scale = 1.0 / planar.len() as f32;
        (0..frames)
            .map(|i| planar.iter().map(|ch| ch[i]).sum::<f32>() * scale)
            .collect()
    };

    vec![mono; target]
}

fn resample_planar(planar: Vec<Vec<f32>>, from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    let channels = planar.len();
    let input_frames = planar[0].len();
    let expected = (input_frames as f64 * to_rate as f64 / from_rate as f64).round() as usize;

    if input_frames == 0 {
        return Ok(vec![Vec::new(); channels]);
    }

    let mut resampler = FastFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        CHUNK_FRAMES,
        channels,
    )
    .map_err(|e| PodgenError::format_mismatch(format!("failed to create resampler: {e}")))?;

    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];
    let resample_err = |e: rubato::ResampleError| {
        PodgenError::format_mismatch(format!("resampling failed: {e}"))
    };

    let mut pos = 0;
    while input_frames - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + n]).collect();
        let out = resampler.process(&chunk, None).map_err(resample_err)?;
        extend_planar(&mut output, out);
        pos += n;
    }

    if pos < input_frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
        let out = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(resample_err)?;
        extend_planar(&mut output, out);
    }

    // Flush the interpolator's delay line.
    while output[0].len() < expected + delay {
        let out = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(resample_err)?;
        if out.first().is_none_or(Vec::is_empty) {
            break;
        }
        extend_planar(&mut output, out);
    }

    for ch in &mut output {
        let skip = delay.min(ch.len());
        ch.drain(..skip);
        ch.resize(expected, 0.0);
    }

    Ok(output)
}

fn extend_planar(output: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
    for (dst, src) in output.iter_mut().zip(chunk) {
        dst.extend(src);
    }
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, L, R, ...]
/// Output: [[L, L, L, ...], [R, R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame in samples.chunks_exact(num_channels) {
        for (ch, &sample) in planar.iter_mut().zip(frame) {
            ch.push(sample);
        }
    }

    planar
}

/// Convert planar samples to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let num_channels = planar.len();
    let num_frames = planar.first().map_or(0, Vec::len);
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch in &planar {
            interleaved.push(ch[frame_idx]);
        }
    }

    interleaved
}
