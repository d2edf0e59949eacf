//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/weft/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/weft/` (~/.config/weft/)
//! - State/Logs: `$XDG_STATE_HOME/weft/` (~/.local/state/weft/)
//!
//! Every timing knob of the stream connection manager lives in
//! [`StreamConfig`] and is passed in explicitly; there are no module-level
//! constants to override.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Control-plane server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Event-stream tuning
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control-plane server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the control-plane API (e.g., `http://127.0.0.1:7600`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the API (optional; local servers run open)
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds (snapshot fetch, outbound actions)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("server.base_url must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("server.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:7600".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Event-stream connection tuning
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Initial reconnect backoff in milliseconds (doubles per attempt)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Ceiling for reconnect backoff in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Staleness watchdog tick interval in seconds
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,

    /// Seconds without any event or heartbeat before the connection is
    /// reported as lagging
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Maximum number of live timeline items retained; oldest are evicted
    /// beyond this to keep merge cost bounded
    #[serde(default = "default_live_buffer_cap")]
    pub live_buffer_cap: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            watchdog_interval_secs: default_watchdog_interval(),
            stale_after_secs: default_stale_after(),
            live_buffer_cap: default_live_buffer_cap(),
        }
    }
}

impl StreamConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.backoff_base_ms == 0 {
            return Err(Error::Config(
                "stream.backoff_base_ms must be positive".to_string(),
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(Error::Config(
                "stream.backoff_max_ms must be >= stream.backoff_base_ms".to_string(),
            ));
        }
        if self.watchdog_interval_secs == 0 {
            return Err(Error::Config(
                "stream.watchdog_interval_secs must be positive".to_string(),
            ));
        }
        if self.stale_after_secs <= self.watchdog_interval_secs {
            return Err(Error::Config(
                "stream.stale_after_secs must exceed stream.watchdog_interval_secs".to_string(),
            ));
        }
        if self.live_buffer_cap == 0 {
            return Err(Error::Config(
                "stream.live_buffer_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Watchdog tick interval as a Duration
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    /// Staleness threshold as a Duration
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

fn default_backoff_base_ms() -> u64 {
    800
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_watchdog_interval() -> u64 {
    4
}

fn default_stale_after() -> u64 {
    20
}

fn default_live_buffer_cap() -> usize {
    4096
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.stream.validate()?;
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/weft/config.toml` (~/.config/weft/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("weft").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/weft/` (~/.local/state/weft/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("weft")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/weft/weft.log` (~/.local/state/weft/weft.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("weft.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
