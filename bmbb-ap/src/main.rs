//! Audio Player (bmbb-ap) - Main entry point
//!
//! Discovers songs on the storage root, builds the playback engine and
//! serves the line-oriented command surface on stdin until `quit`, end of
//! input, Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bmbb_ap::audio::{CpalSink, PacedSink, PcmSink};
use bmbb_ap::config::{LineBackend, SinkKind, TomlConfig};
use bmbb_ap::discovery::discover;
use bmbb_ap::motion::{ActuatorLines, SysfsLines, TraceLines};
use bmbb_ap::playback::{EngineOptions, PlaybackEngine};
use bmbb_ap::shell::{self, Command, HELP};
use bmbb_common::config::{resolve_root_folder, ROOT_FOLDER_ENV};

const DEFAULT_LOG_FILTER: &str = "bmbb_ap=info,bmbb_common=info";

/// Command-line arguments for bmbb-ap
#[derive(Parser, Debug)]
#[command(name = "bmbb-ap")]
#[command(about = "Lip-synced audio and motion player for the singing fish")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "BMBB_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder containing the SONGS / JOKES folders
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Audio output backend (overrides the config file)
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// cpal output device name (overrides the config file)
    #[arg(long)]
    device: Option<String>,

    /// Press the button once at start-up
    #[arg(long)]
    autoplay: bool,
}

/// `RUST_LOG` wins, then the config file level, then the built-in filter
fn log_filter(level: Option<&str>) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => format!("bmbb_ap={level},bmbb_common={level}").into(),
        None => DEFAULT_LOG_FILTER.into(),
    })
}

fn build_sink(kind: SinkKind, device: Option<String>, write_timeout: Duration) -> Box<dyn PcmSink> {
    match kind {
        SinkKind::Cpal => Box::new(CpalSink::new(device, write_timeout)),
        SinkKind::Paced => Box::new(PacedSink::new(write_timeout)),
    }
}

fn build_lines(config: &TomlConfig) -> Result<Box<dyn ActuatorLines>> {
    Ok(match config.motion.backend {
        LineBackend::Trace => Box::new(TraceLines::new()),
        LineBackend::Sysfs => Box::new(
            SysfsLines::open(&config.motion.gpio_root, &config.motion.pins)
                .context("Failed to open GPIO lines")?,
        ),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_path) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(log_filter(config.logging.level.as_deref()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bmbb-ap v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found, using built-in defaults"),
    }

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        config.root_folder.as_deref(),
    );
    info!("Root folder: {}", root_folder.display());

    let sink_kind = args.sink.unwrap_or(config.audio.sink);
    let device = args.device.clone().or_else(|| config.audio.device.clone());
    let sink = build_sink(sink_kind, device, config.write_timeout());
    let lines = build_lines(&config)?;

    let mut engine = PlaybackEngine::new(sink, lines, EngineOptions::from(&config))
        .context("Failed to initialize playback engine")?;

    match discover(&root_folder) {
        Ok(found) => {
            for entry in found {
                if let Err(e) =
                    engine.add_to(entry.mode, &entry.audio_path, &entry.instruction_path)
                {
                    warn!("Skipping {}: {}", entry.audio_path.display(), e);
                }
            }
        }
        Err(e) => warn!("Song discovery failed: {}", e),
    }
    info!(
        "Catalog: {} songs, {} jokes",
        engine.catalog().songs(bmbb_ap::playback::Mode::Songs).len(),
        engine.catalog().songs(bmbb_ap::playback::Mode::Jokes).len()
    );

    if args.autoplay {
        match shell::execute(&mut engine, Command::Press).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => error!("Autoplay failed: {}", e),
        }
    }

    run_shell(&mut engine).await?;

    if let Err(e) = engine.cancel_current().await {
        warn!("Failed to stop playback cleanly: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

/// Serve commands from stdin until quit, end of input or a shutdown signal
async fn run_shell(engine: &mut PlaybackEngine) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    println!("{}", HELP);
    loop {
        let line = tokio::select! {
            _ = &mut shutdown => return Ok(()),
            line = input.next_line() => line.context("Failed to read stdin")?,
        };

        let Some(line) = line else {
            // End of input: let a running session finish
            if engine.is_playing() {
                info!("Input closed, waiting for the session to finish");
                tokio::select! {
                    _ = &mut shutdown => {}
                    result = engine.wait_idle() => {
                        if let Err(e) = result {
                            error!("Session failed: {}", e);
                        }
                    }
                }
            }
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{} (try 'help')", e);
                continue;
            }
        };

        let reply = tokio::select! {
            _ = &mut shutdown => return Ok(()),
            reply = shell::execute(engine, command) => reply,
        };
        match reply {
            Ok(reply) => println!("{}", reply),
            Err(e) => println!("error: {}", e),
        }
        if command == Command::Quit {
            return Ok(());
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
