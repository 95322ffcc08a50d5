//! `run` command handler
//!
//! Wires the configured engine to stdin/stdout and runs until EOF or a
//! shutdown signal.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::RunArgs;
use crate::cli::commands::load_config;
use crate::config::{DuelJackConfig, StatsSettings};
use crate::dispatch;
use crate::duel::{DuelEngine, SeededDice, TokioScheduler};
use crate::error::DuelJackError;
use crate::observability::{EventEmitter, init_metrics};
use crate::stats::{InMemoryStatsRepository, JsonFileStatsRepository, StatsRepository};

/// Start the engine on stdio.
///
/// On `cancel` the intent in flight is finished and answered, then the timer
/// driver is stopped and every pending timer disarmed.
///
/// # Errors
///
/// Returns a config error for a bad configuration file, a stats error if the
/// snapshot cannot be opened, or an I/O error if stdio fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), DuelJackError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => {
            info!("no configuration file, using defaults");
            Arc::new(DuelJackConfig::default())
        }
    };

    let stats = open_stats(&config.stats).await?;
    let events = match args.events_file.as_ref().or(config.events.path.as_ref()) {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let (scheduler, timers) = TokioScheduler::new();
    let scheduler = Arc::new(scheduler);
    let engine = Arc::new(
        DuelEngine::new(
            config.duel.clone(),
            stats,
            Arc::clone(&scheduler) as _,
            Box::new(SeededDice::from_config(config.duel.rng_seed)),
        )
        .with_guild(config.stats.guild)
        .with_events(Arc::new(events)),
    );

    let driver_cancel = cancel.child_token();
    let driver = engine.spawn_timer_driver(timers, driver_cancel.clone());
    info!(guild = config.stats.guild.0, "dueljack ready");

    let served = dispatch::serve(&engine, tokio::io::stdin(), tokio::io::stdout(), cancel).await;

    driver_cancel.cancel();
    scheduler.shutdown();
    if let Err(e) = driver.await {
        warn!(error = %e, "timer driver ended abnormally");
    }

    let summary = served?;
    info!(
        handled = summary.handled,
        malformed = summary.malformed,
        live = engine.store().live_count(),
        "dueljack stopped"
    );
    Ok(())
}

/// Opens the configured stats store, in memory when no path is set.
///
/// # Errors
///
/// Returns a stats error if the snapshot exists but cannot be loaded.
pub async fn open_stats(
    settings: &StatsSettings,
) -> Result<Arc<dyn StatsRepository>, DuelJackError> {
    Ok(match &settings.path {
        Some(path) => {
            info!(path = %path.display(), "using file stats store");
            Arc::new(JsonFileStatsRepository::open(path).await?)
        }
        None => {
            warn!("no stats path configured, stats are kept in memory only");
            Arc::new(InMemoryStatsRepository::new())
        }
    })
}
