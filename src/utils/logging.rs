//! Tracing subscriber setup for the `autoupdate` binary.
//!
//! The `format` setting in the `logging` config section picks the output:
//! `component` (default) prints one compact line per event with its
//! `package`/`latest`/`current` fields, `pretty` spreads each event over
//! several lines, and `json` emits one object per line, optionally appended
//! to `logging.file`. Text output goes to stderr so `autoupdate check` keeps
//! stdout for its report.

use std::io::IsTerminal;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AutoupdateError, Result};

/// Install the global subscriber described by `cfg`.
///
/// `RUST_LOG` overrides `cfg.level`. Fails if a subscriber is already
/// installed or the log file cannot be opened.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let ansi = std::io::stderr().is_terminal();

    let installed = match (cfg.format, cfg.file.as_deref()) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        (LogFormat::Json, None) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        (LogFormat::Pretty, _) => tracing_subscriber::fmt()
            .pretty()
            .with_ansi(ansi)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        (LogFormat::Component, _) => tracing_subscriber::fmt()
            .compact()
            .with_ansi(ansi)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| AutoupdateError::Config(format!("failed to initialize logging: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// ```
/// # use autoupdate::log_component;
/// log_component!(info, "scheduler", "cycle finished");
/// log_component!(warn, "installer", "install failed", package = "pkg-a");
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
