//! Configuration types for the window watch service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::WatchError;

/// Prefix marking a credential that should be read from the environment
const ENV_SECRET_PREFIX: &str = "env:";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval_seconds: u64,
    #[serde(default = "default_backoff_base")]
    pub error_backoff_base_seconds: u64,
    #[serde(default = "default_backoff_max")]
    pub error_backoff_max_seconds: u64,
    #[serde(default = "default_debounce")]
    pub debounce_seconds: i64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_watchdog_timeout")]
    pub watchdog_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub watchdog_restart: bool,
    /// Regex identifying the monitored surface (window title, process, ...)
    #[serde(default)]
    pub target: String,
    /// Content filter applied to every snippet; empty accepts everything
    #[serde(default)]
    pub match_pattern: String,
    #[serde(default)]
    pub skip_lower_leading_number: bool,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    #[serde(default)]
    pub telemetry_file: Option<PathBuf>,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub sender_retry: Option<RetryConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            healthcheck_interval_seconds: default_healthcheck_interval(),
            error_backoff_base_seconds: default_backoff_base(),
            error_backoff_max_seconds: default_backoff_max(),
            debounce_seconds: default_debounce(),
            max_history: default_max_history(),
            watchdog_timeout_seconds: default_watchdog_timeout(),
            watchdog_restart: true,
            target: String::new(),
            match_pattern: String::new(),
            skip_lower_leading_number: false,
            history_file: default_history_file(),
            telemetry_file: None,
            scanner: ScannerConfig::default(),
            sender: SenderConfig::default(),
            sender_retry: None,
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Scanner configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScannerConfig {
    /// Reads snippets, one per line, from a text dump of the surface
    #[serde(rename = "file")]
    File { path: PathBuf },
    /// Runs a helper program and reads snippets from its stdout
    #[serde(rename = "command")]
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_command_timeout")]
        timeout_seconds: u64,
    },
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig::File {
            path: PathBuf::from("window.txt"),
        }
    }
}

impl ScannerConfig {
    pub fn type_name(&self) -> &str {
        match self {
            ScannerConfig::File { .. } => "file",
            ScannerConfig::Command { .. } => "command",
        }
    }
}

/// Sender configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum SenderConfig {
    #[default]
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "webhook")]
    Webhook { url: String },
    #[serde(rename = "pushover")]
    Pushover {
        api_token: String,
        user_key: String,
        #[serde(default = "default_pushover_title")]
        title: String,
    },
}

impl SenderConfig {
    pub fn type_name(&self) -> &str {
        match self {
            SenderConfig::Log => "log",
            SenderConfig::Webhook { .. } => "webhook",
            SenderConfig::Pushover { .. } => "pushover",
        }
    }
}

/// Retry settings applied inside the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_delay_ms: default_retry_initial_delay(),
            max_delay_ms: default_retry_max_delay(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_recent_size")]
    pub history_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            history_size: default_recent_size(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_healthcheck_interval() -> u64 {
    3600
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    300
}

fn default_debounce() -> i64 {
    600
}

fn default_max_history() -> usize {
    500
}

fn default_watchdog_timeout() -> u64 {
    120
}

fn default_history_file() -> PathBuf {
    PathBuf::from("history.json")
}

fn default_command_timeout() -> u64 {
    30
}

fn default_pushover_title() -> String {
    "Window Watch".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_initial_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_recent_size() -> usize {
    100
}

impl Config {
    /// Check the invariants the notification loop relies on
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval_seconds == 0 {
            return Err(WatchError::Config(
                "poll_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.error_backoff_base_seconds == 0 {
            return Err(WatchError::Config(
                "error_backoff_base_seconds must be at least 1".to_string(),
            ));
        }
        if self.error_backoff_max_seconds < self.error_backoff_base_seconds {
            return Err(WatchError::Config(format!(
                "error_backoff_max_seconds ({}) must not be below error_backoff_base_seconds ({})",
                self.error_backoff_max_seconds, self.error_backoff_base_seconds
            )));
        }
        if self.max_history == 0 {
            return Err(WatchError::Config(
                "max_history must be at least 1".to_string(),
            ));
        }
        for (field, pattern) in [("target", &self.target), ("match_pattern", &self.match_pattern)] {
            regex::Regex::new(pattern).map_err(|e| {
                WatchError::Config(format!("{} is not a valid regex: {}", field, e))
            })?;
        }
        Ok(())
    }

    /// Replace `env:NAME` sender credentials with the value of `NAME`
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        match &mut self.sender {
            SenderConfig::Log => {}
            SenderConfig::Webhook { url } => resolve_secret(url)?,
            SenderConfig::Pushover {
                api_token,
                user_key,
                ..
            } => {
                resolve_secret(api_token)?;
                resolve_secret(user_key)?;
            }
        }
        Ok(())
    }
}

fn resolve_secret(value: &mut String) -> crate::Result<()> {
    if let Some(name) = value.strip_prefix(ENV_SECRET_PREFIX) {
        let resolved = std::env::var(name).map_err(|_| {
            WatchError::Config(format!("environment variable {} is not set", name))
        })?;
        tracing::debug!("Resolved secret from environment variable {}", name);
        *value = resolved;
    }
    Ok(())
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
