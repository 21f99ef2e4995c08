//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a serde default so a partial (or missing) file still
//! yields a runnable configuration. Timing constants likely to be tuned
//! per deployment (snipe window, extension, grace) live here rather than
//! in code.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bidding: BiddingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Scheduler loop settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// How often the scheduler scans for expired rounds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Bid admission and round timing settings.
#[derive(Debug, Deserialize, Clone)]
pub struct BiddingConfig {
    /// Seconds past round end during which a bid is still admitted
    /// (network/clock tolerance).
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: i64,
    /// A bid landing within this many seconds of round end extends it.
    #[serde(default = "default_snipe_window_secs")]
    pub snipe_window_secs: i64,
    /// How far the end time is pushed when anti-sniping triggers.
    #[serde(default = "default_snipe_extension_secs")]
    pub snipe_extension_secs: i64,
    /// Used when a round was created without an explicit duration.
    #[serde(default = "default_round_duration_secs")]
    pub default_round_duration_secs: i64,
    /// Lower clamp applied at auction creation.
    #[serde(default = "default_min_round_duration_secs")]
    pub min_round_duration_secs: i64,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        BiddingConfig {
            grace_window_secs: default_grace_window_secs(),
            snipe_window_secs: default_snipe_window_secs(),
            snipe_extension_secs: default_snipe_extension_secs(),
            default_round_duration_secs: default_round_duration_secs(),
            min_round_duration_secs: default_min_round_duration_secs(),
        }
    }
}

/// Fund-custody policy.
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Whether `adjust_available` may drive an account's available
    /// balance negative. On by default to support demo funding flows;
    /// turn off to refuse overdrafts.
    #[serde(default = "default_allow_overdraft")]
    pub allow_overdraft: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            allow_overdraft: default_allow_overdraft(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_grace_window_secs() -> i64 {
    2
}

fn default_snipe_window_secs() -> i64 {
    30
}

fn default_snipe_extension_secs() -> i64 {
    30
}

fn default_round_duration_secs() -> i64 {
    60
}

fn default_min_round_duration_secs() -> i64 {
    30
}

fn default_allow_overdraft() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load configuration, falling back to built-in defaults when the
    /// file does not exist. A malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!(path, "No config file found, using defaults");
            return Ok(AppConfig::default());
        }
        Self::load(path)
    }
}
