//! Configuration management for Webpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/webpilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{Result, WebpilotError};
use crate::core::types::BrowserKind;

/// Main configuration for Webpilot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Automation service configuration
    pub server: ServerConfig,
    /// Browser session configuration
    pub browser: BrowserConfig,
    /// Polling configuration
    #[serde(default)]
    pub polling: PollingConfig,
    /// Interactive task configuration
    #[serde(default)]
    pub task: TaskConfig,
}

/// Automation service endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 8000)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser engine to request: chromium, firefox, or webkit
    pub browser_type: BrowserKind,
    /// Whether the remote browser runs headless
    pub headless: bool,
    /// Per-command timeout in seconds, forwarded to the server
    pub command_timeout_secs: u64,
}

/// Polling configuration for command and session status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between command status fetches in milliseconds
    pub command_interval_ms: u64,
    /// Interval between session status refreshes in milliseconds
    pub session_interval_ms: u64,
    /// Consecutive failed ticks tolerated before a command is marked failed
    pub max_consecutive_failures: u32,
}

/// Interactive task defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Default step budget for interactive tasks
    pub max_steps: u32,
    /// Whether tasks run interactively by default
    pub interactive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            polling: PollingConfig::default(),
            task: TaskConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::var("WEBPILOT_SERVER_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("WEBPILOT_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            timeout_secs: 120,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser_type: env::var("WEBPILOT_BROWSER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(BrowserKind::Chromium),
            headless: env::var("WEBPILOT_HEADLESS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            command_timeout_secs: 30,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            command_interval_ms: 1000,
            session_interval_ms: 5000,
            max_consecutive_failures: 30,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            interactive: false,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Try to load from config file
        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(WebpilotError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| WebpilotError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| WebpilotError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| WebpilotError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| WebpilotError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| WebpilotError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Get the automation service base URL
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }

    /// Interval between command status fetches
    pub fn command_poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.command_interval_ms)
    }

    /// Interval between session status refreshes
    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.session_interval_ms)
    }
}
