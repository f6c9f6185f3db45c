//! podgen application entry points.
//!
//! Wires configuration, the synthesis client and the episode pipeline together
//! for each command.

use crate::cli::Overrides;
use crate::config::Config;
use crate::episode::collector::{EpisodeInputs, ResponseInput};
use crate::pipeline::orchestrator::{EpisodePipeline, EpisodeReport, EpisodeRequest};
use crate::pipeline::queue::{QueueSummary, process_queue};
use crate::synthesis::http::HttpSynthesizer;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments for producing a single episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeArgs {
    pub prompt: PathBuf,
    pub response: Option<ResponseInput>,
    pub max_segments: Option<usize>,
    pub name: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Arguments for batch mode.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueArgs {
    pub dir: PathBuf,
    pub done: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub max_segments: Option<usize>,
    pub json: bool,
    pub quiet: bool,
}

/// Apply command-line overrides on top of file and environment configuration.
pub fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(url) = &overrides.tts_url {
        config.synthesis.endpoint = url.clone();
    }
    if let Some(voice) = &overrides.voice {
        config.synthesis.voice = voice.clone();
    }
    if let Some(pause) = overrides.pause {
        config.episode.pause_duration_secs = pause.as_secs_f64();
    }
    if let Some(timeout) = overrides.timeout {
        config.synthesis.timeout_secs = timeout.as_secs().max(1);
    }
    if overrides.no_jingles {
        config.episode.intro_jingle = None;
        config.episode.outro_jingle = None;
    }
    if let Some(intro) = &overrides.intro {
        config.episode.intro_jingle = Some(intro.clone());
    }
    if let Some(outro) = &overrides.outro {
        config.episode.outro_jingle = Some(outro.clone());
    }
}

/// Episode name from `--name`, or a UTC timestamp.
///
/// Characters that are unsafe in file names become `_`.
pub fn episode_name(explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        None => format!("episode_{}", Utc::now().format("%Y%m%d_%H%M%S")),
    }
}

/// `--output` if given, else `<output dir>/<name>.wav`.
pub fn output_path(config: &Config, name: &str, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => config.output.dir.join(format!("{name}.wav")),
    }
}

/// Produce one episode.
pub async fn run_episode_command(config: Config, args: EpisodeArgs) -> Result<()> {
    config.validate()?;

    let name = episode_name(args.name.as_deref());
    let request = EpisodeRequest {
        output_path: output_path(&config, &name, args.output.as_deref()),
        name,
        inputs: EpisodeInputs::new(args.prompt, args.response).with_max_segments(args.max_segments),
    };

    let synthesizer = HttpSynthesizer::from_config(&config.synthesis)?;
    let pipeline = EpisodePipeline::new(config, synthesizer);

    let report = tokio::select! {
        result = pipeline.run(&request) => result?,
        _ = tokio::signal::ctrl_c() => bail!("interrupted, no episode written"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.quiet {
        print_report(&report);
    }
    Ok(())
}

/// Produce an episode for every prompt in the queue directory.
pub async fn run_queue_command(mut config: Config, args: QueueArgs) -> Result<QueueSummary> {
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    config.validate()?;

    let output_dir = config.output.dir.clone();
    let synthesizer = HttpSynthesizer::from_config(&config.synthesis)?;
    let pipeline = EpisodePipeline::new(config, synthesizer);

    let summary = tokio::select! {
        result = process_queue(
            &pipeline,
            &args.dir,
            &args.done,
            &output_dir,
            args.max_segments,
        ) => result?,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !args.quiet {
        for report in &summary.completed {
            print_report(report);
        }
        for failure in &summary.failed {
            println!(
                "✗ {}: {} failed [{}]: {}",
                failure.prompt.display(),
                failure.stage,
                failure.kind,
                failure.message
            );
        }
        println!(
            "{} episodes produced, {} failed",
            summary.completed.len(),
            summary.failed.len()
        );
    }
    Ok(summary)
}

/// List voices offered by the synthesis service.
pub async fn run_voices_command(config: &Config) -> Result<()> {
    let synthesizer = HttpSynthesizer::from_config(&config.synthesis)?;
    let voices = synthesizer
        .voices()
        .await
        .with_context(|| format!("Failed to list voices from {}", synthesizer.endpoint()))?;

    println!("Available voices ({}):", synthesizer.endpoint());
    for (id, description) in &voices {
        let marker = if id == &config.synthesis.voice { "*" } else { " " };
        println!("{marker} {id:<14} {description}");
    }
    Ok(())
}

fn print_report(report: &EpisodeReport) {
    let episode = &report.episode;
    println!("✓ Episode ready: {}", episode.audio_path.display());
    println!("  Metadata:  {}", report.metadata_path.display());
    println!(
        "  Duration:  {}",
        format_secs(episode.total_duration_secs)
    );
    for span in &report.segments {
        println!(
            "    {:<13} {:>8} +{}",
            span.kind.as_str(),
            format_secs(span.start_secs),
            format_secs(span.duration_secs)
        );
    }
    match episode.measured_loudness_lufs {
        Some(measured) => println!(
            "  Loudness:  {:.1} LUFS -> {:.1} LUFS ({:+.1} dB{})",
            measured,
            episode.normalization_target_lufs,
            episode.applied_gain_db,
            if report.peak_limited { ", peak limited" } else { "" }
        ),
        None => println!("  Loudness:  silent"),
    }
    if !report.synthesis.turns.is_empty() {
        let synthesis = &report.synthesis;
        println!(
            "  Synthesis: {} turns, {} service calls, {} ({})",
            synthesis.turns.len(),
            synthesis.attempts,
            format_secs(synthesis.elapsed_secs),
            synthesis.voices.join(", ")
        );
        if let Some(rtf) = synthesis.realtime_factor {
            println!("  Realtime:  {rtf:.2}x");
        }
    }
    println!(
        "  Format:    {} Hz, {} ch, {} bytes",
        episode.sample_rate, episode.channels, episode.file_size_bytes
    );
}

fn format_secs(secs: f64) -> String {
    let millis = Duration::try_from_secs_f64(secs)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}
