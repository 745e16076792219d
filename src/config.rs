//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides; command
//! line flags are applied on top by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::websocket::{ConnectionSettings, HubConfig, RelayMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// File served at `/`
    #[serde(default = "default_page_path")]
    pub page_path: String,

    /// Origins allowed to open a WebSocket. Empty accepts every origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5069
}

fn default_page_path() -> String {
    "./templates/index.html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            page_path: default_page_path(),
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default)]
    pub mode: RelayMode,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_dice_faces")]
    pub dice_faces: Vec<u32>,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_connections() -> usize {
    1000
}

fn default_write_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_dice_faces() -> Vec<u32> {
    (1..=6).collect()
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            mode: RelayMode::default(),
            queue_capacity: default_queue_capacity(),
            max_connections: default_max_connections(),
            write_timeout_ms: default_write_timeout(),
            dice_faces: default_dice_faces(),
        }
    }
}

impl HubSettings {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.max_connections,
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            queue_capacity: self.queue_capacity,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("dicerelay").join("config.toml")),
            Some(PathBuf::from("/etc/dicerelay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("DICERELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DICERELAY_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid DICERELAY_PORT"),
            }
        }
        if let Some(page_path) = lookup("DICERELAY_PAGE_PATH") {
            self.server.page_path = page_path;
        }

        if let Some(mode) = lookup("DICERELAY_MODE") {
            match mode.parse() {
                Ok(m) => self.hub.mode = m,
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid DICERELAY_MODE"),
            }
        }

        if let Some(level) = lookup("DICERELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("DICERELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "hub.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.hub.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "hub.write_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.hub.mode == RelayMode::Dice && self.hub.dice_faces.is_empty() {
            return Err(ConfigError::Invalid(
                "hub.dice_faces must not be empty in dice mode".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Dicerelay Configuration
#
# Environment variables override these settings:
# - DICERELAY_HOST
# - DICERELAY_PORT
# - DICERELAY_PAGE_PATH
# - DICERELAY_MODE
# - DICERELAY_LOG_LEVEL
# - DICERELAY_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port
port = 5069

# Page served at /
page_path = "./templates/index.html"

# Origins allowed to open a WebSocket (empty accepts all)
allowed_origins = []

[hub]
# relay: forward each message as an envelope to every other client
# dice: append a two-dice roll and send the text to every client
mode = "relay"

# Frames buffered per client before it is dropped as too slow
queue_capacity = 256

# Maximum concurrent connections
max_connections = 1000

# A socket write slower than this closes the connection (ms)
write_timeout_ms = 10000

# Faces each die can land on (dice mode)
dice_faces = [1, 2, 3, 4, 5, 6]

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
