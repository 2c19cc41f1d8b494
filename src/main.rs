mod cli;

use autoconvert::{
    config::{self, ConfigSource},
    conversion::{
        ConversionScheduler, SchedulerSettings, TranscodeOptions, TranscodeOutcome,
        TranscodeRunner,
    },
    events::{ConverterEvent, StatusEvent},
    log_sink::{LogSink, LogSinkSettings},
    paths::{output_path_for, OUTPUT_EXTENSION},
    tools::{self, ToolSource, TranscoderLocator, TRANSCODER_ENV_VAR},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

async fn start_daemon(config_path: PathBuf, log_dir: PathBuf) -> Result<()> {
    let log = LogSink::new(LogSinkSettings::new(&log_dir))
        .with_context(|| format!("Failed to open log directory: {:?}", log_dir))?;

    let source = ConfigSource::new(config_path, log.clone());

    tracing::info!("Starting autoconvert");
    tracing::info!("Config: {:?}", source.path());
    tracing::info!("Logs: {:?}", log.log_dir());

    let mut scheduler = ConversionScheduler::new(
        SchedulerSettings::default(),
        source,
        TranscoderLocator::default(),
        log.clone(),
    );

    // Stand-in for the status bar and notification centre
    let mut events = scheduler.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => report_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} converter events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, waiting for the current conversion (Ctrl-C again to exit now)");

    tokio::select! {
        _ = scheduler.shutdown() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Exiting without waiting for the current conversion");
        }
    }

    log.flush().await;
    reporter.abort();
    Ok(())
}

fn report_event(event: &ConverterEvent) {
    match event {
        ConverterEvent::Status(StatusEvent::Converting { filename }) => {
            tracing::info!("Converting: {}", filename);
        }
        ConverterEvent::Status(StatusEvent::Idle) => {
            tracing::info!("Converting: idle");
        }
        ConverterEvent::Notification(notification) => {
            tracing::info!("[{}] {}", notification.title, notification.body);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "autoconvert=debug,activity=debug".to_string()
        } else {
            "autoconvert=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config::default_data_dir().join("logs"));

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_daemon(config_path, log_dir))
        }
        Commands::Run { input } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, &log_dir))
        }
        Commands::Resolve { input } => {
            println!("{}", output_path_for(&input, OUTPUT_EXTENSION).display());
            Ok(())
        }
        Commands::CheckTools => check_tools(&log_dir),
        Commands::Validate { config: path } => validate_config(&path.unwrap_or(config_path)),
        Commands::Version => {
            println!("autoconvert {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_file(input: &Path, log_dir: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let log = LogSink::new(LogSinkSettings::new(log_dir))
        .with_context(|| format!("Failed to open log directory: {:?}", log_dir))?;
    let transcoder = tools::locate_transcoder(&log);

    let (events, _) = broadcast::channel(16);
    let runner = TranscodeRunner::new(transcoder, TranscodeOptions::default(), log.clone(), events);
    let output = runner.job_for(input.to_path_buf()).output;

    println!("Converting {} -> {}", input.display(), output.display());
    let outcome = runner.run(input.to_path_buf()).await;
    log.flush().await;

    match outcome {
        TranscodeOutcome::Success => {
            println!("Conversion complete: {}", output.display());
            Ok(())
        }
        TranscodeOutcome::NonZeroExit(code) => {
            anyhow::bail!("Transcoder exited with code {}", code)
        }
        TranscodeOutcome::LaunchFailed(e) => Err(e).context("Failed to start transcoder"),
        TranscodeOutcome::TranscoderMissing => anyhow::bail!(
            "Transcoder not found. Install it or set {}",
            TRANSCODER_ENV_VAR
        ),
    }
}

fn check_tools(log_dir: &Path) -> Result<()> {
    println!("Checking external tools...\n");

    let log = LogSink::new(LogSinkSettings::new(log_dir))
        .with_context(|| format!("Failed to open log directory: {:?}", log_dir))?;
    let locator = TranscoderLocator::default();

    match locator.locate(&log) {
        Some(info) => {
            let source = match info.source {
                ToolSource::Environment => TRANSCODER_ENV_VAR,
                ToolSource::WellKnownDir => "well-known location",
                ToolSource::SearchPath => "PATH",
            };
            print!("✓ {}", locator.name());
            if let Some(version) = tools::tool_version(&info.path) {
                print!(" ({})", version);
            }
            println!(" - {} [{}]", info.path.display(), source);
            println!("\nAll required tools are available!");
        }
        None => {
            println!("✗ {}", locator.name());
            println!(
                "\nThe transcoder is missing. Install it or set {} to its path.",
                TRANSCODER_ENV_VAR
            );
        }
    }

    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    println!("Validating config: {:?}", path);
    let config = config::load_config(path)
        .with_context(|| format!("Invalid configuration: {:?}", path))?;

    println!("✓ Configuration is valid");
    println!("  Path: {}", config.path);
    println!("  Scan root: {}", config.scan_root().display());
    println!("  Interval: {}s", config.interval);
    println!("  Exclusions: {}", config.exclusions().len());
    for entry in config.exclusions() {
        println!("    {}", entry);
    }

    Ok(())
}
