//! Audio decoding using symphonia.
//!
//! Decodes WAV, MP3, FLAC, Ogg Vorbis and AAC/M4A to interleaved f32 PCM at
//! the source sample rate and channel layout. Format conversion happens later
//! in [`crate::audio::resample`].

use crate::audio::buffer::AudioBuffer;
use crate::error::{PodgenError, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Frames a decoded stream may fall short of the declared length.
///
/// Covers encoder priming and padding, which some containers count.
const FRAME_SHORTFALL_TOLERANCE: u64 = 4096;

/// Decode an entire audio file.
///
/// # Errors
/// - `MissingInput` if the file cannot be opened because it does not exist
/// - `FormatMismatch` for unsupported containers/codecs or corrupt data
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    debug!("Decoding file: {}", path.display());

    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PodgenError::MissingInput {
                what: "audio file".to_string(),
                path: path.display().to_string(),
            }
        } else {
            PodgenError::format_mismatch(format!("failed to open {}: {}", path.display(), e))
        }
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    decode_stream(mss, &hint, &path.display().to_string())
}

/// Decode audio held in memory, e.g. a synthesis response body.
///
/// `extension` is a container hint such as `"wav"`; probing still inspects
/// the data itself.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>, label: &str) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(PodgenError::format_mismatch(format!("{label}: no audio data")));
    }

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    decode_stream(mss, &hint, label)
}

fn decode_stream(mss: MediaSourceStream, hint: &Hint, label: &str) -> Result<AudioBuffer> {
    let probed = symphonia::default::get_probe()
        .format(
            hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            PodgenError::format_mismatch(format!("{label}: failed to probe format: {e}"))
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PodgenError::format_mismatch(format!("{label}: no audio track found")))?;

    let track_id = track.id;
    let declared_frames = track.codec_params.n_frames;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            PodgenError::format_mismatch(format!("{label}: unsupported codec: {e}"))
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut decode_errors = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(PodgenError::format_mismatch(format!(
                    "{label}: error reading packet: {e}"
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate.is_none() {
                    sample_rate = Some(spec.rate);
                }
                if channels.is_none() {
                    channels = Some(spec.channels.count() as u16);
                }

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sample_buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("{}: undecodable packet: {}", label, e);
                decode_errors += 1;
            }
            Err(e) => {
                return Err(PodgenError::format_mismatch(format!(
                    "{label}: decode failed: {e}"
                )));
            }
        }
    }

    if decode_errors > 0 {
        return Err(PodgenError::format_mismatch(format!(
            "{label}: {decode_errors} packets could not be decoded"
        )));
    }

    let sample_rate = sample_rate
        .filter(|&r| r > 0)
        .ok_or_else(|| PodgenError::format_mismatch(format!("{label}: sample rate unknown")))?;
    let channels = channels
        .filter(|&c| c > 0)
        .ok_or_else(|| PodgenError::format_mismatch(format!("{label}: channel count unknown")))?;

    let buffer = AudioBuffer::new(samples, sample_rate, channels);
    if let Some(declared) = declared_frames
        && (buffer.frames() as u64).saturating_add(FRAME_SHORTFALL_TOLERANCE) < declared
    {
        return Err(PodgenError::format_mismatch(format!(
            "{label}: truncated, decoded {} of {} frames",
            buffer.frames(),
            declared
        )));
    }

    debug!(
        "{}: decoded {} frames at {}Hz x{} ({:.2}s)",
        label,
        buffer.frames(),
        sample_rate,
        channels,
        buffer.duration().as_secs_f64()
    );

    Ok(buffer)
}
