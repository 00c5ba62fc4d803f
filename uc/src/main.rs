//! uc - Update Coordinator
//!
//! CLI entry point for polling a JSON endpoint through a coordinator.

use std::fs;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use update_coordinator::cli::{Cli, Command, get_log_path};
use update_coordinator::config::Config;
use update_coordinator::coordinator::{Coordinator, CoordinatorError, CoordinatorHandle};
use update_coordinator::events::CoordinatorEvent;
use update_coordinator::observer::{CoordinatorEntity, EntityState};
use update_coordinator::source::HttpSource;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_file: bool) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
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
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), cli.log_file)
        .context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Watch { url, interval, once } => cmd_watch(config, url, interval, once).await,
        Command::Fetch { url } => cmd_fetch(config, url).await,
        Command::Config => cmd_config(&config),
    }
}

/// Apply command-line overrides and validate
fn effective_config(mut config: Config, url: Option<String>, interval: Option<u64>) -> Result<Config> {
    if let Some(url) = url {
        config.source.url = Some(url);
    }
    if let Some(interval) = interval {
        config.coordinator.update_interval_secs = interval;
    }
    if config.coordinator.name == "coordinator" {
        if let Some(host) = config.source.url.as_deref().and_then(host_of) {
            config.coordinator.name = host;
        }
    }
    config.validate()?;
    Ok(config)
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok()?.host_str().map(str::to_string)
}

fn spawn_coordinator(config: &Config) -> Result<(CoordinatorHandle<Value>, tokio::task::JoinHandle<()>)> {
    let source = HttpSource::from_config(&config.source, config.coordinator.fetch_timeout())?;
    info!(name = %config.coordinator.name, url = %source.url(), "Starting coordinator");
    Ok(Coordinator::spawn(config.coordinator.clone(), source))
}

async fn cmd_fetch(config: Config, url: Option<String>) -> Result<()> {
    let config = effective_config(config, url, None)?;
    let (handle, task) = spawn_coordinator(&config)?;

    let result = handle.first_refresh().await;
    handle.shutdown().await?;
    task.await.context("Coordinator task failed")?;

    match result {
        Ok(()) => {
            let data = handle.get_data().ok_or_else(|| eyre::eyre!("Refresh succeeded without data"))?;
            println!("{}", serde_json::to_string_pretty(data.as_ref())?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            Err(e).context(format!("Failed to fetch from {}", config.source.url.unwrap_or_default()))
        }
    }
}

async fn cmd_watch(config: Config, url: Option<String>, interval: Option<u64>, once: bool) -> Result<()> {
    let config = effective_config(config, url, interval)?;
    let (handle, task) = spawn_coordinator(&config)?;

    match handle.first_refresh().await {
        Ok(()) => {}
        Err(e @ CoordinatorError::AuthFailed(_)) => {
            handle.shutdown().await?;
            task.await.context("Coordinator task failed")?;
            return Err(e).context("Credentials rejected, not polling");
        }
        Err(e) if once => {
            handle.shutdown().await?;
            task.await.context("Coordinator task failed")?;
            return Err(e.into());
        }
        Err(e) => eprintln!("{} {}, will keep retrying", "!".yellow(), e),
    }

    let entity = CoordinatorEntity::new(config.coordinator.name.clone(), &handle, print_state);
    entity.attach().await?;

    if once {
        entity.detach().await?;
        handle.shutdown().await?;
        task.await.context("Coordinator task failed")?;
        return Ok(());
    }

    let printer = tokio::spawn(print_events(handle.subscribe()));
    handle.start().await?;
    println!(
        "{} every {}s, Ctrl+C to stop",
        "Watching".bold(),
        config.coordinator.update_interval_secs
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");

    let metrics = handle.metrics().await?;
    info!(?metrics, "Final coordinator metrics");

    entity.detach().await?;
    handle.shutdown().await?;
    task.await.context("Coordinator task failed")?;
    printer.abort();
    Ok(())
}

fn print_state(entity_id: &str, state: &EntityState<Value>) -> Result<()> {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    let data = match &state.data {
        Some(data) => serde_json::to_string(data.as_ref())?,
        None => "-".to_string(),
    };

    if state.available {
        println!("{} {} #{} {}", stamp, entity_id.green(), state.sequence, data);
    } else {
        println!(
            "{} {} #{} {} {}",
            stamp,
            entity_id.yellow(),
            state.sequence,
            "unavailable".red(),
            data.dimmed()
        );
    }
    Ok(())
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<CoordinatorEvent>) {
    loop {
        match rx.recv().await {
            Ok(CoordinatorEvent::Failed {
                failure,
                consecutive_failures,
                ..
            }) if consecutive_failures == 1 => {
                eprintln!("{} {}", "✗".red(), failure);
            }
            Ok(CoordinatorEvent::Recovered { after_failures, .. }) => {
                eprintln!("{} recovered after {} failed refreshes", "✓".green(), after_failures);
            }
            Ok(CoordinatorEvent::Stopped { .. }) => break,
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                debug!(skipped = n, "print_events: lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

