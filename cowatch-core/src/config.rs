use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::models::ControlPolicy;
use crate::{Error, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Tunables of the synchronization protocol.
///
/// Every correction threshold is a contract with the playback surface, not a
/// constant: deployments trade perceptual smoothness against convergence
/// speed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drift at or below this is left alone (seconds)
    pub tolerance_small_seconds: f64,
    /// Drift above this is closed with a hard seek (seconds)
    pub tolerance_large_seconds: f64,
    /// Fractional playback-rate change used for smooth correction (0.05 = ±5%)
    pub rate_adjust: f64,
    /// Local playback sampling interval (milliseconds)
    pub local_tick_interval_ms: u64,
    /// Reference-clock probe interval (seconds)
    pub probe_interval_seconds: u64,
    /// Per-probe round-trip timeout (milliseconds)
    pub probe_timeout_ms: u64,
    /// Probes with a round trip above this are dropped as outliers (milliseconds)
    pub rtt_ceiling_ms: u64,
    /// Clock estimate is stale once no successful probe landed for this long (seconds)
    pub stale_after_seconds: u64,
    /// Base EWMA weight for folding a new offset sample (0..=1)
    pub offset_smoothing: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_small_seconds: 0.3,
            tolerance_large_seconds: 2.0,
            rate_adjust: 0.05,
            local_tick_interval_ms: 500,
            probe_interval_seconds: 10,
            probe_timeout_ms: 2_000,
            rtt_ceiling_ms: 1_000,
            stale_after_seconds: 30,
            offset_smoothing: 0.25,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tolerance_small_seconds < 0.0 {
            return Err(Error::InvalidInput(
                "tolerance_small_seconds must be non-negative".to_string(),
            ));
        }
        if self.tolerance_large_seconds <= self.tolerance_small_seconds {
            return Err(Error::InvalidInput(
                "tolerance_large_seconds must exceed tolerance_small_seconds".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.rate_adjust) || self.rate_adjust == 0.0 {
            return Err(Error::InvalidInput(
                "rate_adjust must be in (0.0, 1.0)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.offset_smoothing) || self.offset_smoothing == 0.0 {
            return Err(Error::InvalidInput(
                "offset_smoothing must be in (0.0, 1.0]".to_string(),
            ));
        }
        if self.local_tick_interval_ms == 0 || self.probe_interval_seconds == 0 {
            return Err(Error::InvalidInput(
                "sampling intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn local_tick_interval(&self) -> Duration {
        Duration::from_millis(self.local_tick_interval_ms)
    }

    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }

    #[must_use]
    pub fn rtt_ceiling_seconds(&self) -> f64 {
        self.rtt_ceiling_ms as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Who may mutate playback while a session is active
    pub control_policy: ControlPolicy,
    /// Maximum chat message length (characters)
    pub max_chat_message_len: usize,
    /// Default number of messages returned by chat history reads
    pub chat_history_limit: usize,
    /// Per-session broadcast channel capacity; slow subscribers past this
    /// observe a lag signal and refetch
    pub transport_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            control_policy: ControlPolicy::AllAdmitted,
            max_chat_message_len: 500,
            chat_history_limit: 100,
            transport_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string(), file_path: None }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (COWATCH_SYNC_RATE_ADJUST, etc.)
        builder = builder.add_source(
            Environment::with_prefix("COWATCH")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        Self::load(Some(path))
    }
}
