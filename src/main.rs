use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use podgen::app::{
    EpisodeArgs, QueueArgs, apply_overrides, run_episode_command, run_queue_command,
    run_voices_command,
};
use podgen::cli::{Cli, Commands, ConfigAction};
use podgen::config::Config;
use podgen::defaults::{QUEUE_DONE_DIR, QUEUE_TO_PROCESS_DIR};
use podgen::diagnostics::check_setup;
use podgen::episode::ResponseInput;
use podgen::pipeline::StageError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref(), &cli)?;
            let Some(prompt) = cli.prompt else {
                anyhow::bail!("a prompt recording is required");
            };
            let response = response_input(
                cli.response,
                cli.response_file,
                cli.script,
                cli.response_audio,
            );
            run_episode_command(
                config,
                EpisodeArgs {
                    prompt,
                    response,
                    max_segments: cli.max_segments,
                    name: cli.name,
                    output: cli.output,
                    json: cli.json,
                    quiet: cli.quiet,
                },
            )
            .await?;
        }
        Some(Commands::Queue {
            ref dir,
            ref done,
            ref output_dir,
            max_segments,
            json,
        }) => {
            let config = load_config(cli.config.as_deref(), &cli)?;
            let summary = run_queue_command(
                config,
                QueueArgs {
                    dir: dir.clone().unwrap_or_else(|| PathBuf::from(QUEUE_TO_PROCESS_DIR)),
                    done: done.clone().unwrap_or_else(|| PathBuf::from(QUEUE_DONE_DIR)),
                    output_dir: output_dir.clone(),
                    max_segments,
                    json,
                    quiet: cli.quiet,
                },
            )
            .await?;
            if !summary.failed.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::Voices) => {
            let config = load_config(cli.config.as_deref(), &cli)?;
            run_voices_command(&config).await?;
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref(), &cli)?;
            if !check_setup(&config).await {
                return Ok(ExitCode::FAILURE);
            }
        }
        Some(Commands::Config { ref action }) => {
            handle_config_command(action, &cli)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "podgen", &mut std::io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Log to stderr. `RUST_LOG` wins over `-q`/`-v`.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "podgen=warn",
        (false, 0) => "podgen=info",
        (false, 1) => "podgen=debug",
        (false, _) => "podgen=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Command-line overrides
/// 2. Environment variables (PODGEN_*)
/// 3. Custom config path from CLI (--config), else ~/.config/podgen/config.toml
/// 4. Built-in defaults
fn load_config(custom_path: Option<&Path>, cli: &Cli) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    let mut config = config.with_env_overrides();
    apply_overrides(&mut config, &cli.overrides);
    Ok(config)
}

fn response_input(
    text: Option<String>,
    text_file: Option<PathBuf>,
    script: Option<PathBuf>,
    audio: Option<PathBuf>,
) -> Option<ResponseInput> {
    text.map(ResponseInput::Text)
        .or(text_file.map(ResponseInput::TextFile))
        .or(script.map(ResponseInput::Script))
        .or(audio.map(ResponseInput::Audio))
}

/// Handle configuration commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(cli.config.as_deref(), cli)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Dump => {
            print!("{}", Config::dump_template());
        }
    }
    Ok(())
}

/// Print an error, naming the failed stage and error kind when known.
fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<StageError>() {
        Some(stage_error) => {
            eprintln!(
                "{} {} failed [{}]: {}",
                "podgen:".red().bold(),
                stage_error.stage,
                stage_error.kind().red(),
                stage_error.source
            );
        }
        None => {
            eprintln!("{} {:#}", "podgen:".red().bold(), error);
        }
    }
}
