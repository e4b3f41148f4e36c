//! TOML Configuration File Support
//!
//! Loads the platform configuration from a TOML file at
//! `~/.config/harmony-tv/platform.toml`, environment variables and CLI flags.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`HARMONY_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! hub_ip = "192.168.1.20"
//! name = "Living Room"
//! refresh_timer = 30
//! main_activity = "Watch TV"
//! dev_mode = false
//! ```
//!
//! The camel-case keys used by older platform configs (`hubIP`, `DEVMODE`,
//! `refreshTimer`, `mainActivity`) are accepted as aliases.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogOptions;
use crate::protocol::DEFAULT_HUB_PORT;

/// Accessory name used when none is configured
pub const DEFAULT_NAME: &str = "Harmony";

/// HTTP discovery timeout used when none is configured
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 10_000;

/// Shortest accepted background refresh interval (seconds)
pub const MIN_REFRESH_SECS: u64 = 5;

/// Longest accepted background refresh interval (seconds)
pub const MAX_REFRESH_SECS: u64 = 600;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structure
// =============================================================================

/// Contents of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformToml {
    /// Hub address
    #[serde(alias = "hubIP")]
    pub hub_ip: Option<String>,

    /// Hub port
    pub hub_port: Option<u16>,

    /// Accessory display name
    pub name: Option<String>,

    /// Prefix activity labels with `DEV`
    #[serde(alias = "DEVMODE")]
    pub dev_mode: Option<bool>,

    /// Background refresh interval in seconds (0 disables)
    #[serde(alias = "refreshTimer")]
    pub refresh_timer: Option<u64>,

    /// Label of the activity to treat as main
    #[serde(alias = "mainActivity")]
    pub main_activity: Option<String>,

    /// HTTP discovery timeout in milliseconds
    pub discovery_timeout_ms: Option<u64>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved platform configuration
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformConfig {
    /// Hub address (required)
    pub hub_ip: String,

    /// Hub port for discovery and the session
    pub hub_port: u16,

    /// Accessory display name
    pub name: String,

    /// Prefix activity labels with `DEV`
    pub dev_mode: bool,

    /// Background refresh interval in seconds, `None` when disabled
    pub refresh_timer_secs: Option<u64>,

    /// Label of the activity to treat as main
    pub main_activity: Option<String>,

    /// HTTP discovery timeout in milliseconds
    pub discovery_timeout_ms: u64,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            hub_ip: String::new(),
            hub_port: DEFAULT_HUB_PORT,
            name: DEFAULT_NAME.to_string(),
            dev_mode: false,
            refresh_timer_secs: None,
            main_activity: None,
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PlatformConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a hub at `hub_ip`, everything else default
    #[must_use]
    pub fn for_hub(hub_ip: impl Into<String>) -> Self {
        Self {
            hub_ip: hub_ip.into(),
            ..Self::default()
        }
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Background refresh period, `None` when disabled
    pub fn refresh_period(&self) -> Option<Duration> {
        self.refresh_timer_secs.map(Duration::from_secs)
    }

    /// Set the refresh interval, normalising it into the accepted range
    pub fn set_refresh_timer(&mut self, secs: u64) {
        self.refresh_timer_secs = normalize_refresh_timer(secs);
    }

    /// HTTP discovery timeout
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    /// Options for decoding the hub catalog
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            dev_mode: self.dev_mode,
            main_activity: self.main_activity.clone(),
        }
    }

    /// Check that the configuration can drive a platform
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when no hub address is set or
    /// the name or timeout is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub_ip.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "hub_ip is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "name must not be empty".to_string(),
            ));
        }
        if self.discovery_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "discovery_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Map a configured refresh interval onto the accepted range
///
/// `0` disables background refresh; anything else is clamped to
/// [`MIN_REFRESH_SECS`]..=[`MAX_REFRESH_SECS`].
pub fn normalize_refresh_timer(secs: u64) -> Option<u64> {
    if secs == 0 {
        return None;
    }
    let clamped = secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);
    if clamped != secs {
        tracing::warn!(
            requested = secs,
            applied = clamped,
            "Refresh timer out of range, clamping"
        );
    }
    Some(clamped)
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/harmony-tv/platform.toml` or
/// `~/.config/harmony-tv/platform.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("harmony-tv").join("platform.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<PlatformConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<PlatformConfig, ConfigError> {
    let mut config = PlatformConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PlatformToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

fn apply_toml_config(config: &mut PlatformConfig, toml: &PlatformToml) {
    if let Some(ref hub_ip) = toml.hub_ip {
        config.hub_ip = hub_ip.clone();
    }
    if let Some(port) = toml.hub_port {
        config.hub_port = port;
    }
    if let Some(ref name) = toml.name {
        config.name = name.clone();
    }
    if let Some(dev_mode) = toml.dev_mode {
        config.dev_mode = dev_mode;
    }
    if let Some(secs) = toml.refresh_timer {
        config.set_refresh_timer(secs);
    }
    if toml.main_activity.is_some() {
        config.main_activity = toml.main_activity.clone();
    }
    if let Some(timeout) = toml.discovery_timeout_ms {
        config.discovery_timeout_ms = timeout;
    }
}

fn apply_env_config(config: &mut PlatformConfig) {
    if let Ok(hub_ip) = std::env::var("HARMONY_HUB_IP") {
        config.hub_ip = hub_ip;
        config.source = ConfigSource::Env;
    }
    if let Ok(port) = std::env::var("HARMONY_HUB_PORT") {
        if let Ok(port) = port.parse::<u16>() {
            config.hub_port = port;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(name) = std::env::var("HARMONY_NAME") {
        config.name = name;
        config.source = ConfigSource::Env;
    }
    if let Ok(enabled) = std::env::var("HARMONY_DEV_MODE") {
        config.dev_mode = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Ok(secs) = std::env::var("HARMONY_REFRESH_TIMER") {
        if let Ok(secs) = secs.parse::<u64>() {
            config.set_refresh_timer(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(label) = std::env::var("HARMONY_MAIN_ACTIVITY") {
        config.main_activity = Some(label);
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("HARMONY_DISCOVERY_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.discovery_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Hub address override
    pub hub_ip: Option<String>,

    /// Accessory name override
    pub name: Option<String>,

    /// Refresh interval override (seconds)
    pub refresh_timer: Option<u64>,

    /// Main activity override
    pub main_activity: Option<String>,

    /// Development mode override
    pub dev_mode: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set hub address override
    #[must_use]
    pub fn with_hub_ip(mut self, hub_ip: String) -> Self {
        self.hub_ip = Some(hub_ip);
        self
    }

    /// Set accessory name override
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set refresh interval override
    #[must_use]
    pub fn with_refresh_timer(mut self, secs: u64) -> Self {
        self.refresh_timer = Some(secs);
        self
    }

    /// Set main activity override
    #[must_use]
    pub fn with_main_activity(mut self, label: String) -> Self {
        self.main_activity = Some(label);
        self
    }

    /// Set development mode override
    #[must_use]
    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PlatformConfig) {
        if self.hub_ip.is_some()
            || self.name.is_some()
            || self.refresh_timer.is_some()
            || self.main_activity.is_some()
            || self.dev_mode.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref hub_ip) = self.hub_ip {
            config.hub_ip = hub_ip.clone();
        }
        if let Some(ref name) = self.name {
            config.name = name.clone();
        }
        if let Some(secs) = self.refresh_timer {
            config.set_refresh_timer(secs);
        }
        if let Some(ref label) = self.main_activity {
            config.main_activity = Some(label.clone());
        }
        if let Some(enabled) = self.dev_mode {
            config.dev_mode = enabled;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
