//! Configuration types for autoupdate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration struct for autoupdate
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Log output configuration
    pub logging: LoggingConfig,
    /// Polling loop configuration
    pub scheduler: SchedulerConfig,
    /// Registry HTTP client configuration
    pub http: HttpConfig,
    /// Package installer configuration
    pub installer: InstallerConfig,
    /// Host reload configuration
    pub reload: ReloadConfig,
    /// Targets registered at startup by the daemon
    pub watch: Vec<WatchEntry>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Compact single-line output with target and fields.
    #[default]
    Component,
    /// JSON lines for log aggregators.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs to this file instead of stderr (json format only).
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}

// ============================================================================
// Scheduler Configuration
// ============================================================================

/// Default pause between cycles in milliseconds.
pub const DEFAULT_TICK_DELAY_MS: u64 = 5;

/// Polling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause after each completed cycle.
    pub tick_delay_ms: u64,
    /// Registry used for targets without their own endpoint.
    pub endpoint: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: DEFAULT_TICK_DELAY_MS,
            endpoint: None,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}

// ============================================================================
// HTTP Configuration
// ============================================================================

/// Smallest accepted request timeout.
pub const MIN_HTTP_TIMEOUT_MS: u64 = 5_000;
/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Registry HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Apply `timeout_ms` to registry requests. Off means no client timeout.
    pub timeout_enabled: bool,
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_enabled: false,
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl HttpConfig {
    /// Effective request timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_enabled
            .then(|| Duration::from_millis(self.timeout_ms.max(MIN_HTTP_TIMEOUT_MS)))
    }
}

// ============================================================================
// Installer / Reload Configuration
// ============================================================================

/// npm installer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Project directory holding `package.json`. Defaults to the working directory.
    pub prefix: Option<String>,
    /// npm executable.
    pub npm_bin: String,
    /// Registry passed to npm and used as the fallback lookup endpoint.
    pub registry: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            npm_bin: "npm".to_string(),
            registry: None,
        }
    }
}

/// Host reload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Program and arguments run to reload the host. Empty disables reloading.
    pub command: Vec<String>,
}

// ============================================================================
// Watch Entries
// ============================================================================

fn default_interval_ms() -> u64 {
    60 * 60 * 1000
}

/// A target registered by the daemon at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub name: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub endpoint: Option<String>,
}
