//! streamchain - stream pipeline chainer
//!
//! CLI entry point for running and checking pipeline definitions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use streamchain::cli::{Cli, Command, generate_after_help};
use streamchain::config::Settings;
use streamchain::ident::{HashAlgorithm, generate_uuid, hash};
use streamchain::pipeline::{PipelineConfig, StreamChainer, TracingLogger};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamchain")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("streamchain.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Settings::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let settings = Settings::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { file } => {
            debug!(?file, "main: matched Run command");
            cmd_run(&settings, &file).await
        }
        Command::Validate { file } => {
            debug!(?file, "main: matched Validate command");
            cmd_validate(&settings, &file)
        }
        Command::Hash { algorithm, data } => {
            debug!(%algorithm, "main: matched Hash command");
            cmd_hash(algorithm, &data)
        }
        Command::Uuid { identifier, timestamp } => {
            debug!(%identifier, timestamp, "main: matched Uuid command");
            cmd_uuid(&identifier, timestamp)
        }
    }
}

/// Run a pipeline definition
async fn cmd_run(settings: &Settings, file: &Path) -> Result<()> {
    debug!(?file, "cmd_run: called");
    let config = PipelineConfig::load(file)?;
    let chainer = StreamChainer::from_settings(settings).with_logger(Arc::new(TracingLogger));

    chainer
        .run(Some(&config))
        .await
        .context(format!("Pipeline {} failed", config.name))?;

    println!("{} Pipeline {} finished", "✓".green(), config.name.cyan());
    Ok(())
}

/// Check a pipeline definition without running it
fn cmd_validate(settings: &Settings, file: &Path) -> Result<()> {
    debug!(?file, "cmd_validate: called");
    let config = PipelineConfig::load(file)?;

    StreamChainer::from_settings(settings)
        .validate(&config)
        .context(format!("Pipeline {} is invalid", config.name))?;

    println!("{} Pipeline {} is valid", "✓".green(), config.name.cyan());
    for (index, step) in config.steps.iter().enumerate() {
        println!("  {} {}", index.to_string().yellow(), step.kind());
    }
    Ok(())
}

fn cmd_hash(algorithm: HashAlgorithm, data: &str) -> Result<()> {
    debug!(%algorithm, "cmd_hash: called");
    println!("{}", hash(algorithm, data));
    Ok(())
}

fn cmd_uuid(identifier: &str, timestamp: u64) -> Result<()> {
    debug!(%identifier, timestamp, "cmd_uuid: called");
    let uuid = generate_uuid(identifier, timestamp)?;
    println!("{}", uuid);
    Ok(())
}
