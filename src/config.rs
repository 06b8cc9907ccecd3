//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::session::backoff::{
    BackoffPolicy, DEFAULT_BASE_MS, DEFAULT_CAP_EXPONENT, DEFAULT_JITTER_MS, DEFAULT_MAX_MS,
};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub mock: MockConfig,
}

/// Instrument link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_normalize")]
    pub normalize: bool,

    #[serde(default = "default_debug_frames")]
    pub debug_frames: bool,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_cap_exponent")]
    pub backoff_cap_exponent: u32,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Synthetic session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MockConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    #[serde(default = "default_min_period_ms")]
    pub min_period_ms: u64,
}

// Default value functions
fn default_url() -> String { "ws://192.168.4.1/ws".to_string() }
fn default_normalize() -> bool { true }
fn default_debug_frames() -> bool { true }
fn default_base_backoff_ms() -> u64 { DEFAULT_BASE_MS }
fn default_max_backoff_ms() -> u64 { DEFAULT_MAX_MS }
fn default_backoff_cap_exponent() -> u32 { DEFAULT_CAP_EXPONENT }
fn default_jitter_ms() -> u64 { DEFAULT_JITTER_MS }

fn default_frequency_hz() -> f64 { 1.0 }
fn default_min_period_ms() -> u64 { 100 }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            normalize: default_normalize(),
            debug_frames: default_debug_frames(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_cap_exponent: default_backoff_cap_exponent(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency_hz: default_frequency_hz(),
            min_period_ms: default_min_period_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.link.url.is_empty() {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("link url cannot be empty")
            ));
        }

        if !self.link.url.starts_with("ws://") && !self.link.url.starts_with("wss://") {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("link url must use the ws:// or wss:// scheme")
            ));
        }

        if self.link.base_backoff_ms == 0 || self.link.base_backoff_ms > 60000 {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("base_backoff_ms must be between 1 and 60000")
            ));
        }

        if self.link.max_backoff_ms < self.link.base_backoff_ms {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("max_backoff_ms must be at least base_backoff_ms")
            ));
        }

        if self.link.backoff_cap_exponent > 10 {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("backoff_cap_exponent must be at most 10")
            ));
        }

        if !self.mock.frequency_hz.is_finite() || self.mock.frequency_hz <= 0.0 {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("frequency_hz must be a positive number")
            ));
        }

        if self.mock.min_period_ms == 0 || self.mock.min_period_ms > 60000 {
            return Err(crate::error::TelemetryBridgeError::Config(
                toml::de::Error::custom("min_period_ms must be between 1 and 60000")
            ));
        }

        Ok(())
    }

    /// Reconnect schedule described by the link section
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.link.base_backoff_ms),
            Duration::from_millis(self.link.max_backoff_ms),
            self.link.backoff_cap_exponent,
            Duration::from_millis(self.link.jitter_ms),
        )
    }
}
