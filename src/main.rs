// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Smart City Ingest - monitoring agent for the installation's sensor boards
//!
//! Reads the board's line output, classifies and debounces it and stores the
//! resulting events for the dashboards.
//!
//! Subcommands:
//! - `run` (default): ingest until Ctrl+C, or until a replay file runs dry
//! - `events`: query stored events
//! - `init-config`: write a default configuration file

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use smartcity_ingest::config::LabelsConfig;
use smartcity_ingest::core::Category;
use smartcity_ingest::db::DateFilter;
use smartcity_ingest::{build_info, Config, Database, Deployment, Monitor, NAME, VERSION};

/// Smart City Ingest - sensor event ingestion and debounce engine
#[derive(Parser, Debug)]
#[command(name = "smartcity-ingest")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Classify, debounce and store events from smart city sensor boards")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long, global = true)]
    trace: bool,

    /// Board type, selects the rule set and label defaults
    #[arg(long, value_enum, global = true)]
    deployment: Option<Deployment>,

    /// Serial port of the board
    #[arg(long)]
    port: Option<String>,

    /// Replay a recorded board log instead of opening the serial port
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Event database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion loop
    Run,

    /// Query stored events
    Events {
        /// Category label or name, e.g. "Incendio" or FireAlert
        #[arg(long)]
        category: Option<Category>,

        /// Only the most recent event of --category
        #[arg(long, requires = "category")]
        latest: bool,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        month: Option<u32>,

        #[arg(long)]
        day: Option<u32>,

        /// Events with an id above this high-water mark, oldest first
        #[arg(long)]
        after: Option<i64>,

        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);

    let log_filter = init_logging(&args)?;

    if let Some(Command::InitConfig { force }) = &args.command {
        return init_config(&config_path, args.deployment.unwrap_or_default(), *force);
    }

    // Load or create configuration
    let mut config = match args.deployment {
        Some(deployment) if !config_path.exists() => {
            let config = Config::for_deployment(deployment);
            config.save(&config_path)?;
            config
        }
        _ => Config::load_or_create(&config_path)?,
    };

    // Override with command line args
    if let Some(deployment) = args.deployment {
        if deployment != config.deployment {
            config.deployment = deployment;
            config.labels = LabelsConfig::for_deployment(deployment);
        }
    }
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(replay) = &args.replay {
        config.serial.replay_file = Some(replay.clone());
    }
    if let Some(db) = &args.db {
        config.database.path = db.clone();
    }
    config.validate()?;

    apply_configured_level(&args, &log_filter, &config.log_level)?;
    info!("Configuration loaded from {:?}", config_path);

    match args.command {
        Some(Command::Events {
            category,
            latest,
            year,
            month,
            day,
            after,
            limit,
            json,
        }) => {
            let query = EventQuery {
                category,
                latest,
                filter: DateFilter { year, month, day },
                after,
                limit,
            };
            show_events(&config, &query, json)
        }
        Some(Command::Run) | None => {
            let info = build_info();
            info!("{} v{} ({:?} board)", NAME, VERSION, config.deployment);
            info!("   {} {} features: {:?}", info.os, info.target, info.features);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_monitor(config))
        }
        Some(Command::InitConfig { .. }) => Ok(()),
    }
}

type LogFilter = reload::Handle<EnvFilter, Registry>;

fn cli_level(args: &Args) -> Option<&'static str> {
    if args.trace {
        Some("trace")
    } else if args.debug {
        Some("debug")
    } else {
        None
    }
}

/// Start logging from RUST_LOG or the command line flags, before the
/// configuration file is read
fn init_logging(args: &Args) -> Result<LogFilter> {
    let level = cli_level(args).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_file(args.debug)
                .with_line_number(args.debug),
        )
        .try_init()?;
    Ok(handle)
}

/// Switch to the configured level unless RUST_LOG or a flag already chose one
fn apply_configured_level(args: &Args, handle: &LogFilter, configured: &str) -> Result<()> {
    if cli_level(args).is_some() || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return Ok(());
    }
    handle.reload(EnvFilter::try_new(configured)?)?;
    Ok(())
}

fn init_config(path: &Path, deployment: Deployment, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    Config::for_deployment(deployment).save(path)?;
    println!("Wrote {:?} configuration to {}", deployment, path.display());
    Ok(())
}

/// Run the ingestion loop until Ctrl+C or end of replay
async fn run_monitor(config: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing current line...");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                warn!("Could not listen for Ctrl+C: {}", e);
                // Keep the sender alive so the monitor is not told to stop
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    info!("   Press Ctrl+C to shutdown");
    let mut monitor = Monitor::new(&config);
    let stats = monitor.run(shutdown_rx).await?;

    info!(
        "Shutdown complete: {} lines read, {} events stored",
        stats.lines_read, stats.persisted
    );
    Ok(())
}

struct EventQuery {
    category: Option<Category>,
    latest: bool,
    filter: DateFilter,
    after: Option<i64>,
    limit: usize,
}

fn show_events(config: &Config, query: &EventQuery, json: bool) -> Result<()> {
    let db = Database::open(&config.database)?;
    let has_date = query.filter != DateFilter::default();

    let events = match (query.after, query.category) {
        (Some(after), _) => db.events_after(after, query.limit)?,
        (None, Some(category)) if query.latest => {
            db.latest_of_category(category.label())?.into_iter().collect()
        }
        (None, Some(category)) => db.events_by_category(category.label(), query.limit)?,
        (None, None) if has_date => db.events_on(query.filter, query.limit)?,
        (None, None) => db.recent_events(query.limit)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    for event in &events {
        println!(
            "{:>6}  {}  {:<20}  {:<20}  {:<12}  {}",
            event.id,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.category,
            event.location,
            event.sensor,
            event.description
        );
    }

    let stats = db.stats()?;
    println!();
    println!(
        "{} shown, {} stored, latest id {}",
        events.len(),
        stats.event_count,
        stats.latest_id.map_or_else(|| "-".to_string(), |id| id.to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_handle(initial: &str) -> (reload::Layer<EnvFilter, Registry>, LogFilter) {
        reload::Layer::new(EnvFilter::new(initial))
    }

    fn current(handle: &LogFilter) -> String {
        handle.with_current(|f| f.to_string()).unwrap()
    }

    #[test]
    fn test_flags_pick_the_startup_level() {
        assert_eq!(cli_level(&Args::parse_from(["smartcity-ingest"])), None);
        assert_eq!(cli_level(&Args::parse_from(["smartcity-ingest", "-d"])), Some("debug"));
        assert_eq!(cli_level(&Args::parse_from(["smartcity-ingest", "-d", "--trace"])), Some("trace"));
    }

    #[test]
    fn test_configured_level_applies_after_load() {
        let (_layer, handle) = filter_handle("info");
        let args = Args::parse_from(["smartcity-ingest", "events"]);
        apply_configured_level(&args, &handle, "warn").unwrap();

        let expected = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() { "info" } else { "warn" };
        assert_eq!(current(&handle), expected);
    }

    #[test]
    fn test_flag_wins_over_configured_level() {
        let (_layer, handle) = filter_handle("debug");
        let args = Args::parse_from(["smartcity-ingest", "--debug", "run"]);
        apply_configured_level(&args, &handle, "warn").unwrap();
        assert_eq!(current(&handle), "debug");
    }
}
