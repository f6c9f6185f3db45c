//! Writes an assembled episode and its metadata sidecar to their final paths.
//!
//! Each file is written to a hidden temporary file in the destination
//! directory and renamed into place once complete, so the target path only
//! ever holds a finished file.

use crate::audio::wav::write_wav;
use crate::episode::assembler::AssembledEpisode;
use crate::error::{PodgenError, Result};
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Final artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEpisode {
    pub audio_path: PathBuf,
    pub total_duration_secs: f64,
    pub file_size_bytes: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub normalization_target_lufs: f64,
    pub measured_loudness_lufs: Option<f64>,
    pub applied_gain_db: f64,
}

pub struct EpisodeWriter;

impl EpisodeWriter {
    /// Encode `episode` as 16-bit WAV at `path`, replacing any existing file.
    ///
    /// Creates the parent directory if needed. Inputs are never touched.
    ///
    /// # Errors
    /// `Write` when the directory, temporary file, encoding or final rename fails.
    /// Nothing is left at `path` in that case.
    pub fn write(episode: &AssembledEpisode, path: &Path) -> Result<RenderedEpisode> {
        write_atomic(path, ".wav.part", |writer| {
            write_wav(writer, &episode.buffer).map_err(|e| e.to_string())
        })?;

        let file_size_bytes = fs::metadata(path).map_err(|e| write_error(path, e))?.len();
        info!(
            "Wrote {} ({:.1}s, {} bytes)",
            path.display(),
            episode.duration().as_secs_f64(),
            file_size_bytes
        );

        Ok(RenderedEpisode {
            audio_path: path.to_path_buf(),
            total_duration_secs: episode.duration().as_secs_f64(),
            file_size_bytes,
            sample_rate: episode.buffer.sample_rate,
            channels: episode.buffer.channels,
            normalization_target_lufs: episode.loudness.target_lufs,
            measured_loudness_lufs: episode.loudness.measured_lufs,
            applied_gain_db: episode.loudness.applied_gain_db,
        })
    }

    /// Serialize `metadata` as pretty JSON at `path`, replacing any existing file.
    ///
    /// # Errors
    /// `Write` under the same conditions as [`EpisodeWriter::write`].
    pub fn write_metadata<T: Serialize>(metadata: &T, path: &Path) -> Result<()> {
        write_atomic(path, ".json.part", |writer| {
            serde_json::to_writer_pretty(&mut *writer, metadata).map_err(|e| e.to_string())?;
            writer.write_all(b"\n").map_err(|e| e.to_string())
        })?;
        debug!("Wrote metadata {}", path.display());
        Ok(())
    }
}

fn write_atomic<F>(path: &Path, suffix: &str, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> std::result::Result<(), String>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| write_error(path, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".podgen-")
        .suffix(suffix)
        .tempfile_in(&parent)
        .map_err(|e| write_error(path, e))?;
    debug!("Writing {} via {}", path.display(), temp.path().display());

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        fill(&mut writer).map_err(|e| write_error(path, e))?;
        writer.flush().map_err(|e| write_error(path, e))?;
    }
    temp.as_file().sync_all().map_err(|e| write_error(path, e))?;

    temp.persist(path).map_err(|e| write_error(path, e.error))?;
    Ok(())
}

fn write_error(path: &Path, error: impl std::fmt::Display) -> PodgenError {
    PodgenError::Write {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
