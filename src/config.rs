//! Runtime configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file (`SYNCGATE_CONFIG_PATH`, or `syncgate.toml` in the working
//! directory), and `SYNCGATE_*`-prefixed environment variables, e.g.
//! `SYNCGATE_POLL__INTERVAL_SECS=2`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poll: PollConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between poll sweeps of a non-empty table.
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Root of the notification topic hierarchy.
    pub topic_root: String,

    /// Per-worker namespace under the root. Scopes this worker's
    /// subscription so it does not receive every other worker's completions.
    pub worker_namespace: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            topic_root: "syncgate".to_string(),
            worker_namespace: "worker-default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default sources.
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}

/// Builder for loading a `Config` with overrides.
#[derive(Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Set the config file path (overrides the default search).
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let path = self
            .config_path
            .or_else(|| std::env::var("SYNCGATE_CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("syncgate.toml"));

        let mut builder = config::Config::builder();
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("SYNCGATE").separator("__"))
            .build()
            .context("failed to read configuration sources")?;

        let cfg: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;

        if cfg.poll.interval_secs == 0 {
            anyhow::bail!("poll.interval_secs must be greater than zero");
        }

        Ok(cfg)
    }
}
