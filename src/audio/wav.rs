//! WAV encoding for rendered episodes and in-memory synthesized audio.

use crate::audio::buffer::AudioBuffer;
use crate::defaults::OUTPUT_BITS_PER_SAMPLE;
use std::io::{Cursor, Seek, Write};

/// 16-bit integer PCM spec for a buffer's rate and channel layout.
pub fn wav_spec(buffer: &AudioBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write a buffer as 16-bit PCM WAV and finalize the header.
pub fn write_wav<W: Write + Seek>(writer: W, buffer: &AudioBuffer) -> hound::Result<()> {
    let mut wav_writer = hound::WavWriter::new(writer, wav_spec(buffer))?;
    for &sample in &buffer.samples {
        wav_writer.write_sample(to_i16(sample))?;
    }
    wav_writer.finalize()
}

/// Encode a buffer into an in-memory WAV file.
pub fn encode_wav(buffer: &AudioBuffer) -> hound::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&mut cursor, buffer)?;
    Ok(cursor.into_inner())
}

/// Quantize a float sample to i16 with clipping.
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
