//! `autoscaler-events` — maintenance binary for the autoscaler event store.
//!
//! # Usage
//!
//! ```
//! autoscaler-events --config config.toml run
//! autoscaler-events prune
//! autoscaler-events latest <JOB_KEY> <REASON> <EVENT_KEY>
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use autoscaler_events_core::{retention::prune_expired, store::EventStore};
use autoscaler_events_store_sqlite::SqliteEventStore;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::PrunerConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Autoscaler event store maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one retention cycle and exit.
  Prune,
  /// Run retention cycles on the configured interval until Ctrl-C.
  Run,
  /// Print the latest event of a series as JSON.
  Latest {
    job_key:   String,
    reason:    String,
    event_key: String,
  },
  /// Print every event recorded for a job and reason as JSON.
  Series { job_key: String, reason: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = PrunerConfig::load(&cli.config)?;

  match cli.command {
    Command::Prune => {
      let store = open_store(&cfg).await?;
      let report = prune_expired(&store, &cfg.policy())
        .await
        .context("retention cycle failed")?;
      println!("{}", serde_json::to_string(&report)?);
    }
    Command::Run => run(&open_store(&cfg).await?, &cfg).await?,
    Command::Latest { job_key, reason, event_key } => {
      let store = open_existing_store(&cfg).await?;
      let latest = store
        .find_latest(&job_key, &reason, &event_key)
        .await
        .context("latest event lookup failed")?;
      println!("{}", serde_json::to_string_pretty(&latest)?);
    }
    Command::Series { job_key, reason } => {
      let store = open_existing_store(&cfg).await?;
      let series = store
        .find_series(&job_key, &reason)
        .await
        .context("event series lookup failed")?;
      println!("{}", serde_json::to_string_pretty(&series)?);
    }
  }

  Ok(())
}

async fn open_store(cfg: &PrunerConfig) -> Result<SqliteEventStore> {
  SqliteEventStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))
}

/// Lookups never create the database; a wrong path is an error, not an
/// empty result.
async fn open_existing_store(cfg: &PrunerConfig) -> Result<SqliteEventStore> {
  SqliteEventStore::open_existing(&cfg.store_path)
    .await
    .with_context(|| format!("no event store at {:?}", cfg.store_path))
}

/// Prune on a fixed interval. A failed cycle is logged and the next tick
/// tries again from a freshly computed boundary.
async fn run(store: &SqliteEventStore, cfg: &PrunerConfig) -> Result<()> {
  let policy = cfg.policy();
  let mut ticker = tokio::time::interval(cfg.interval());
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  tracing::info!(
    store = %cfg.store_path.display(),
    ttl_secs = cfg.ttl_secs,
    batch_size = cfg.batch_size,
    interval_secs = cfg.interval_secs,
    "starting retention worker"
  );

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        if let Err(e) = prune_expired(store, &policy).await {
          tracing::error!(error = %e, "retention cycle failed");
        }
      }
      signal = tokio::signal::ctrl_c() => {
        signal.context("failed to listen for ctrl-c")?;
        tracing::info!("shutting down retention worker");
        return Ok(());
      }
    }
  }
}
