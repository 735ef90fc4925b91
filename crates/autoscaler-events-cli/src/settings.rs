//! Runtime configuration for the retention worker.
//!
//! Read from an optional TOML file layered with `AUTOSCALER_EVENTS_*`
//! environment variables; every key has a default except `store_path`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, ensure};
use autoscaler_events_core::retention::{
  DEFAULT_BATCH_SIZE, DEFAULT_TTL, RetentionPolicy,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PrunerConfig {
  /// SQLite database file holding the event table.
  pub store_path:    PathBuf,
  /// Age in seconds after which an event may be pruned.
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs:      u64,
  /// Maximum rows removed per delete statement.
  #[serde(default = "default_batch_size")]
  pub batch_size:    u32,
  /// Pause between retention cycles in `run` mode.
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
}

fn default_ttl_secs() -> u64 { DEFAULT_TTL.as_secs() }

fn default_batch_size() -> u32 { DEFAULT_BATCH_SIZE }

fn default_interval_secs() -> u64 { 10 }

impl PrunerConfig {
  /// Load from `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("AUTOSCALER_EVENTS"))
      .build()
      .context("failed to read config file")?;

    Self::from_settings(settings)
  }

  fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise PrunerConfig")?;
    ensure!(cfg.batch_size > 0, "batch_size must be greater than zero");
    ensure!(cfg.interval_secs > 0, "interval_secs must be greater than zero");
    Ok(cfg)
  }

  pub fn policy(&self) -> RetentionPolicy {
    RetentionPolicy {
      ttl:        Duration::from_secs(self.ttl_secs),
      batch_size: self.batch_size,
    }
  }

  pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_secs) }
}
