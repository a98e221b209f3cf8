//! Application config file
//!
//! One TOML file holds logging, the flat settings table and simulator
//! tuning. Settings are kept as raw strings so invalid stored values can be
//! healed on load instead of failing the parse.

use anyhow::{Context, Result};
use chromasync_core::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "chromasync.toml";

/// Simulated playback tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Stop after this many seconds; run until Ctrl-C when absent
    pub duration_secs: Option<u64>,
    /// Frame interval in milliseconds
    pub frame_interval_ms: u64,
    /// Seconds each track plays before skipping to the next
    pub track_secs: u64,
    /// Simulated host round-trip in milliseconds
    pub host_latency_ms: u64,
    /// Seconds between variable snapshots in the log
    pub report_interval_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_secs: None,
            frame_interval_ms: 16,
            track_secs: 12,
            host_latency_ms: 40,
            report_interval_secs: 2,
        }
    }
}

/// Everything read from the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging
    pub log: LogConfig,
    /// Raw engine settings, keyed like `harmony-rule`
    pub settings: BTreeMap<String, String>,
    /// Playback simulation
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    /// Read `path`, or defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Write to `path` as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("Failed to write config file: {:?}", path))
    }
}
