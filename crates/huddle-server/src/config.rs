//! Server configuration.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - TOML configuration file
//! - Environment variables (HUDDLE_*, nested keys joined with `__`)

use anyhow::{bail, Context, Result};
use huddle_core::PresenceConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Presence timing.
    #[serde(default)]
    pub presence: PresenceSettings,

    /// Request limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Cross-origin access for browser clients.
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Presence timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSettings {
    /// Silence after which a participant is expired, in milliseconds.
    #[serde(default = "default_stale_after")]
    pub stale_after_ms: u64,

    /// Interval between sweeps, in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message text length, in characters.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allow any origin.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_stale_after() -> u64 {
    10_000 // 10 seconds
}

fn default_sweep_interval() -> u64 {
    15_000 // 15 seconds
}

fn default_max_text_length() -> usize {
    2000
}

fn default_max_body_bytes() -> usize {
    16 * 1024 // 16 KB
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            presence: PresenceSettings::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after(),
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

const CONFIG_PATHS: [&str; 3] = [
    "huddle.toml",
    "/etc/huddle/huddle.toml",
    "~/.config/huddle/huddle.toml",
];

impl Config {
    /// Load configuration from `path`, or the first default path that
    /// exists, with environment overrides applied on top.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be parsed or the result is
    /// invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => CONFIG_PATHS
                .iter()
                .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
                .find(|p| p.exists()),
        };

        let base = match &file {
            Some(file) => {
                tracing::info!("Loading configuration from {}", file.display());
                Self::from_file(file)?
            }
            None => Self::default(),
        };

        let config: Config = config::Config::builder()
            .add_source(config::Config::try_from(&base).context("Failed to stage configuration")?)
            .add_source(
                config::Environment::with_prefix("HUDDLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read environment overrides")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.presence.stale_after_ms == 0 {
            bail!("presence.stale_after_ms must be greater than zero");
        }
        if self.presence.sweep_interval_ms == 0 {
            bail!("presence.sweep_interval_ms must be greater than zero");
        }
        if self.limits.max_text_length == 0 {
            bail!("limits.max_text_length must be greater than zero");
        }
        Ok(())
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn presence_config(&self) -> PresenceConfig {
        PresenceConfig {
            stale_after: Duration::from_millis(self.presence.stale_after_ms),
            sweep_interval: Duration::from_millis(self.presence.sweep_interval_ms),
            max_text_length: self.limits.max_text_length,
        }
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid host:port {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.presence.stale_after_ms, 10_000);
        assert_eq!(config.presence.sweep_interval_ms, 15_000);
        assert!(config.cors.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 5000);

        let bad = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [presence]
            stale_after_ms = 4000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.presence.stale_after_ms, 4000);
        assert_eq!(config.presence.sweep_interval_ms, 15_000);
    }

    #[test]
    fn test_presence_config_conversion() {
        let config = Config::default();
        let presence = config.presence_config();
        assert_eq!(presence.stale_after, Duration::from_secs(10));
        assert_eq!(presence.sweep_interval, Duration::from_secs(15));
        assert_eq!(presence.max_text_length, 2000);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = Config::default();
        config.presence.sweep_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.presence.stale_after_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let path = std::env::temp_dir().join(format!("huddle-test-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 7001\n[limits]\nmax_text_length = 50\n").unwrap();

        let from_file = Config::from_file(&path).unwrap();
        let layered = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(from_file.port, 7001);
        assert_eq!(from_file.limits.max_text_length, 50);
        assert_eq!(layered.limits.max_text_length, 50);
        assert_eq!(layered.presence.stale_after_ms, 10_000);
    }
}
