//! Setup diagnostics for `podgen check`.
//!
//! Verifies configuration, jingles, the output directory and the speech
//! synthesis service before a real run.

use crate::config::Config;
use crate::defaults::is_supported_extension;
use crate::synthesis::http::HttpSynthesizer;
use std::collections::BTreeMap;
use std::path::Path;

/// Result of a single check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Check passed
    Ok,
    /// Required resource is missing
    NotFound,
    /// Usable, but something needs attention
    Warning(String),
}

/// Check an optional jingle path.
fn check_jingle(path: Option<&Path>) -> Option<CheckResult> {
    let path = path?;
    if !path.is_file() {
        return Some(CheckResult::NotFound);
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if !is_supported_extension(ext) {
        return Some(CheckResult::Warning(format!("unsupported extension '{ext}'")));
    }
    Some(CheckResult::Ok)
}

/// Check that episodes can be written to `dir`.
fn check_output_dir(dir: &Path) -> CheckResult {
    if !dir.exists() {
        return CheckResult::Warning("does not exist yet (created on first write)".to_string());
    }
    if !dir.is_dir() {
        return CheckResult::NotFound;
    }
    match tempfile::tempfile_in(dir) {
        Ok(_) => CheckResult::Ok,
        Err(e) => CheckResult::Warning(format!("not writable: {e}")),
    }
}

/// Configured voices the service does not offer.
fn missing_voices<'a>(config: &'a Config, available: &BTreeMap<String, String>) -> Vec<&'a str> {
    let mut wanted: Vec<&str> = std::iter::once(config.synthesis.voice.as_str())
        .chain(config.synthesis.speakers.iter().map(|s| s.voice.as_str()))
        .collect();
    wanted.sort_unstable();
    wanted.dedup();
    wanted
        .into_iter()
        .filter(|v| !available.contains_key(*v))
        .collect()
}

fn print_result(label: &str, result: &CheckResult, not_found: &str) {
    print!("{label}: ");
    match result {
        CheckResult::Ok => println!("✓ OK"),
        CheckResult::NotFound => println!("✗ {not_found}"),
        CheckResult::Warning(msg) => println!("⚠ WARNING: {msg}"),
    }
}

/// Run all checks and print results. Returns false if an episode run would fail.
pub async fn check_setup(config: &Config) -> bool {
    let mut ready = true;
    println!("Checking podgen setup...\n");

    print!("Configuration: ");
    match config.validate() {
        Ok(()) => println!("✓ OK"),
        Err(e) => {
            println!("✗ {e}");
            ready = false;
        }
    }

    for (label, path) in [
        ("Intro jingle", config.episode.intro_jingle.as_deref()),
        ("Outro jingle", config.episode.outro_jingle.as_deref()),
    ] {
        match check_jingle(path) {
            None => println!("{label}: - not configured"),
            Some(result) => {
                if result == CheckResult::NotFound {
                    ready = false;
                }
                let shown = path.map(|p| p.display().to_string()).unwrap_or_default();
                print_result(label, &result, &format!("NOT FOUND ({shown})"));
            }
        }
    }

    let output = check_output_dir(&config.output.dir);
    if output == CheckResult::NotFound {
        ready = false;
    }
    print_result(
        &format!("Output directory ({})", config.output.dir.display()),
        &output,
        "exists but is not a directory",
    );

    println!();
    print!("Synthesis service ({}): ", config.synthesis.endpoint);
    let synthesizer = match HttpSynthesizer::from_config(&config.synthesis) {
        Ok(s) => s,
        Err(e) => {
            println!("✗ {e}");
            return false;
        }
    };
    match synthesizer.health().await {
        Ok(health) if health.model_loaded => println!("✓ OK ({})", health.status),
        Ok(health) => {
            println!("⚠ WARNING: model not loaded (status: {})", health.status);
            ready = false;
        }
        Err(e) => {
            println!("✗ {e}");
            println!("  Start the Kokoro service or set PODGEN_TTS_URL / --tts-url");
            return false;
        }
    }

    print!("Voices: ");
    match synthesizer.voices().await {
        Ok(available) => {
            let missing = missing_voices(config, &available);
            if missing.is_empty() {
                println!("✓ OK ({} available)", available.len());
            } else {
                println!("✗ not offered by service: {}", missing.join(", "));
                println!("  Run `podgen voices` to list available voices.");
                ready = false;
            }
        }
        Err(e) => println!("⚠ WARNING: could not list voices: {e}"),
    }

    println!();
    if ready {
        println!("✓ Ready to produce episodes.");
    } else {
        println!("⚠ Fix the issues above before producing episodes.");
    }
    ready
}
