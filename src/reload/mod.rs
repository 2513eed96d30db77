//! Host reload trigger.
//!
//! The scheduler calls [`ReloadTrigger::reload`] at most once per cycle, after
//! every due target has been processed.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::ReloadConfig;
use crate::error::{AutoupdateError, Result};

/// The host's hot-reload mechanism.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReloadTrigger: Send + Sync {
    async fn reload(&self) -> Result<()>;
}

/// Runs an external command to reload the host.
#[derive(Debug, Clone)]
pub struct CommandReload {
    program: String,
    args: Vec<String>,
}

impl CommandReload {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from config. Returns `None` when no command is configured.
    pub fn from_config(config: &ReloadConfig) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl ReloadTrigger for CommandReload {
    async fn reload(&self) -> Result<()> {
        info!(program = %self.program, "Reloading host");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| AutoupdateError::Reload(format!("Failed to run {}: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AutoupdateError::Reload(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Reload trigger that only logs. Used when the host has no reload hook.
#[derive(Debug, Clone, Default)]
pub struct NoopReload;

#[async_trait]
impl ReloadTrigger for NoopReload {
    async fn reload(&self) -> Result<()> {
        info!("Reload requested but no reload command is configured; restart the host to pick up updates");
        Ok(())
    }
}

/// Adapter turning an async closure into a [`ReloadTrigger`].
pub struct FnReload<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ReloadTrigger for FnReload<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn reload(&self) -> Result<()> {
        (self.f)().await
    }
}

/// Wrap an async closure as a shareable reload trigger.
pub fn reload_fn<F, Fut>(f: F) -> Arc<dyn ReloadTrigger>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnReload { f })
}
