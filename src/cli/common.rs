//! Shared CLI helpers used across multiple command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use autoupdate::config::Config;
use autoupdate::utils::logging::init_logging;

/// Expand `~/` prefix to the user's home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Load config from `path`, or the default location when `None`, then set up
/// logging from it and report any config warnings through the new subscriber.
pub(crate) fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path
        .map(|p| expand_tilde(&p))
        .unwrap_or_else(Config::path);
    let (config, warnings) = Config::load_with_warnings(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Warning: {}", e);
    }
    for message in &warnings {
        warn!(path = %path.display(), "Config {}", message);
    }
    Ok(config)
}
