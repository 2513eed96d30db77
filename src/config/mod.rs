//! Configuration management for autoupdate
//!
//! Configuration is loaded from `~/.autoupdate/config.json` with environment
//! variable overrides of the form `AUTOUPDATE_SECTION_KEY`.

mod types;
pub mod validate;

pub use types::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{AutoupdateError, Result};
use crate::watch::MIN_SAFE_INTERVAL_MS;

impl Config {
    /// Returns the autoupdate configuration directory path (~/.autoupdate)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autoupdate")
    }

    /// Returns the path to the config file (~/.autoupdate/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// Config warnings are logged immediately. Callers that install the
    /// tracing subscriber after loading should use
    /// [`load_with_warnings`](Self::load_with_warnings) instead.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let (config, warnings) = Self::load_with_warnings(path)?;
        for message in &warnings {
            warn!(path = %path.display(), "Config {}", message);
        }
        Ok(config)
    }

    /// Load configuration from `path` and return it with its warnings
    /// (unknown fields, risky values) instead of logging them.
    pub fn load_with_warnings(path: &Path) -> Result<(Self, Vec<String>)> {
        let mut warnings = Vec::new();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Config::default()
            } else {
                let raw: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                    AutoupdateError::Config(format!("{}: {}", path.display(), e))
                })?;
                warnings.extend(validate::unknown_fields(&raw));
                serde_json::from_value(raw).map_err(|e| {
                    AutoupdateError::Config(format!("{}: {}", path.display(), e))
                })?
            }
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        warnings.extend(config.warnings());
        Ok((config, warnings))
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AUTOUPDATE_SCHEDULER_TICK_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.scheduler.tick_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("AUTOUPDATE_SCHEDULER_ENDPOINT") {
            self.scheduler.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("AUTOUPDATE_HTTP_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.http.timeout_enabled = true;
                self.http.timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("AUTOUPDATE_INSTALLER_PREFIX") {
            self.installer.prefix = Some(val);
        }
        if let Ok(val) = std::env::var("AUTOUPDATE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject configs the daemon cannot run.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.watch {
            if entry.name.trim().is_empty() {
                return Err(AutoupdateError::Config(
                    "watch entry with empty name".to_string(),
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(AutoupdateError::Config(format!(
                    "'{}' is listed in watch more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Values the daemon accepts but that are probably mistakes.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.http.timeout_enabled && self.http.timeout_ms < MIN_HTTP_TIMEOUT_MS {
            out.push(format!(
                "http.timeout_ms {} is below {}ms, using {}ms",
                self.http.timeout_ms, MIN_HTTP_TIMEOUT_MS, MIN_HTTP_TIMEOUT_MS
            ));
        }
        for entry in &self.watch {
            if entry.interval_ms < MIN_SAFE_INTERVAL_MS {
                out.push(format!(
                    "watch '{}' interval_ms {} is below one second",
                    entry.name, entry.interval_ms
                ));
            }
        }
        out
    }
}
