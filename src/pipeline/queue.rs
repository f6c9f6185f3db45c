//! Batch mode: produce one episode per prompt recording in a directory.
//!
//! Each prompt may have a response next to it sharing its stem:
//! `<stem>.script.txt` (dialogue script) or `<stem>.txt` (plain text).
//! Prompts that produced an episode are moved, with their response file, to
//! the done directory. Failures are reported and left in place. A prompt whose
//! stem was already taken by an earlier file (`q.mp3` after `q.m4a`) is
//! reported as failed instead of overwriting that episode.

use crate::defaults::is_supported_extension;
use crate::episode::collector::{EpisodeInputs, ResponseInput};
use crate::error::{PodgenError, Result};
use crate::pipeline::orchestrator::{EpisodePipeline, EpisodeReport, EpisodeRequest};
use crate::pipeline::stage::{Stage, StageError};
use crate::synthesis::synthesizer::SpeechSynthesizer;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A prompt waiting in the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub name: String,
    pub prompt: PathBuf,
    pub response: Option<ResponseInput>,
    /// Earlier prompt with the same stem, which owns the episode name.
    pub duplicate_of: Option<PathBuf>,
}

impl QueueItem {
    fn response_path(&self) -> Option<&Path> {
        match &self.response {
            Some(
                ResponseInput::Script(p) | ResponseInput::TextFile(p) | ResponseInput::Audio(p),
            ) => Some(p),
            Some(ResponseInput::Text(_)) | None => None,
        }
    }
}

/// A queue item that did not produce an episode.
#[derive(Debug, Clone, Serialize)]
pub struct QueueOutcome {
    pub prompt: PathBuf,
    pub stage: Stage,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSummary {
    pub completed: Vec<EpisodeReport>,
    pub failed: Vec<QueueOutcome>,
}

/// List prompt recordings in `dir`, sorted by file name.
///
/// # Errors
/// `MissingInput` when the directory does not exist.
pub fn scan_queue(dir: &Path) -> Result<Vec<QueueItem>> {
    if !dir.is_dir() {
        return Err(PodgenError::MissingInput {
            what: "queue directory".to_string(),
            path: dir.display().to_string(),
        });
    }

    let mut prompts: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(is_supported_extension)
        })
        .collect();
    prompts.sort();

    let mut owners: HashMap<String, PathBuf> = HashMap::new();
    Ok(prompts
        .into_iter()
        .map(|prompt| {
            let name = prompt
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let duplicate_of = owners.get(&name).cloned();
            if duplicate_of.is_none() {
                owners.insert(name.clone(), prompt.clone());
            }
            let response = find_response(dir, &name);
            QueueItem {
                name,
                prompt,
                response,
                duplicate_of,
            }
        })
        .collect())
}

fn find_response(dir: &Path, stem: &str) -> Option<ResponseInput> {
    let script = dir.join(format!("{stem}.script.txt"));
    if script.is_file() {
        return Some(ResponseInput::Script(script));
    }
    let text = dir.join(format!("{stem}.txt"));
    if text.is_file() {
        return Some(ResponseInput::TextFile(text));
    }
    None
}

/// Process every prompt in `dir`, writing episodes to `output_dir`.
///
/// One failing prompt does not stop the rest.
pub async fn process_queue<S: SpeechSynthesizer>(
    pipeline: &EpisodePipeline<S>,
    dir: &Path,
    done_dir: &Path,
    output_dir: &Path,
    max_segments: Option<usize>,
) -> Result<QueueSummary> {
    let items = scan_queue(dir)?;
    if items.is_empty() {
        info!("No prompts in {}", dir.display());
        return Ok(QueueSummary::default());
    }

    info!("Processing {} prompts from {}", items.len(), dir.display());
    let mut summary = QueueSummary::default();

    for (index, item) in items.iter().enumerate() {
        info!("[{}/{}] {}", index + 1, items.len(), item.name);
        if let Some(owner) = &item.duplicate_of {
            let error = StageError::new(
                Stage::Collecting,
                PodgenError::InvalidPlan {
                    message: format!(
                        "{} has the same name as {}",
                        item.prompt.display(),
                        owner.display()
                    ),
                },
            );
            warn!("{}: {}", item.name, error);
            summary.failed.push(outcome(item, &error));
            continue;
        }

        let request = EpisodeRequest {
            name: item.name.clone(),
            inputs: EpisodeInputs::new(&item.prompt, item.response.clone())
                .with_max_segments(max_segments),
            output_path: output_dir.join(format!("{}.wav", item.name)),
        };

        match pipeline.run(&request).await {
            Ok(report) => {
                archive(item, done_dir);
                summary.completed.push(report);
            }
            Err(e) => {
                warn!("{}: {}", item.name, e);
                summary.failed.push(outcome(item, &e));
            }
        }
    }

    info!(
        "Queue finished: {} succeeded, {} failed",
        summary.completed.len(),
        summary.failed.len()
    );
    Ok(summary)
}

fn outcome(item: &QueueItem, error: &StageError) -> QueueOutcome {
    QueueOutcome {
        prompt: item.prompt.clone(),
        stage: error.stage,
        kind: error.kind().to_string(),
        message: error.source.to_string(),
    }
}

/// Move a finished prompt and its response file into `done_dir`.
fn archive(item: &QueueItem, done_dir: &Path) {
    if let Err(e) = fs::create_dir_all(done_dir) {
        warn!("Cannot create {}: {}", done_dir.display(), e);
        return;
    }
    let files = std::iter::once(item.prompt.as_path()).chain(item.response_path());
    for file in files {
        let Some(file_name) = file.file_name() else {
            continue;
        };
        let target = done_dir.join(file_name);
        if let Err(e) = move_file(file, &target) {
            warn!("Failed to move {} to {}: {}", file.display(), target.display(), e);
        }
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Rename fails across filesystems.
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
