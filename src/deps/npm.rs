//! npm-backed installer.
//!
//! Runs `npm ls` / `npm install` against a project directory, the same way a
//! Node host would manage its plugin dependencies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::InstallerConfig;
use crate::error::{AutoupdateError, Result};

use super::installer::Installer;
use super::types::{parse_npm_ls, DepMap};

/// Installer that shells out to `npm` in `prefix`.
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    prefix: PathBuf,
    npm_bin: String,
    registry: Option<String>,
}

impl NpmInstaller {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            npm_bin: "npm".to_string(),
            registry: None,
        }
    }

    /// Use a specific npm executable.
    pub fn with_npm_bin(mut self, npm_bin: impl Into<String>) -> Self {
        self.npm_bin = npm_bin.into();
        self
    }

    /// Pass `--registry` to installs and report it as the installer endpoint.
    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        let prefix = config
            .prefix
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(prefix)
            .with_npm_bin(config.npm_bin.clone())
            .with_registry(config.registry.clone())
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Arguments for `npm install`, packages sorted by name.
    pub(crate) fn install_args(&self, deps: &HashMap<String, String>) -> Vec<String> {
        let mut args = vec![
            "install".to_string(),
            "--prefix".to_string(),
            self.prefix.to_string_lossy().to_string(),
        ];
        if let Some(registry) = &self.registry {
            args.push("--registry".to_string());
            args.push(registry.clone());
        }
        let mut specs: Vec<String> = deps
            .iter()
            .map(|(name, version)| format!("{}@{}", name, version))
            .collect();
        specs.sort();
        args.extend(specs);
        args
    }
}

#[async_trait]
impl Installer for NpmInstaller {
    async fn get_deps(&self) -> Result<DepMap> {
        let output = Command::new(&self.npm_bin)
            .args(["ls", "--json", "--depth=0", "--prefix"])
            .arg(&self.prefix)
            .output()
            .await
            .map_err(|e| AutoupdateError::Install(format!("Failed to run npm ls: {}", e)))?;

        // npm ls exits non-zero for extraneous or missing packages but still
        // prints the tree, so only an empty stdout is fatal.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutoupdateError::Install(format!("npm ls failed: {}", stderr.trim())));
        }
        let deps = parse_npm_ls(&stdout)?;
        debug!(count = deps.len(), prefix = ?self.prefix, "Read installed dependencies");
        Ok(deps)
    }

    async fn install(&self, deps: &HashMap<String, String>) -> Result<()> {
        if deps.is_empty() {
            return Ok(());
        }
        let output = Command::new(&self.npm_bin)
            .args(self.install_args(deps))
            .output()
            .await
            .map_err(|e| AutoupdateError::Install(format!("Failed to run npm install: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutoupdateError::Install(format!(
                "npm install failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn endpoint(&self) -> Option<String> {
        self.registry.clone()
    }
}
