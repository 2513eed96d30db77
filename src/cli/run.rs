//! `autoupdate run`: the long-running update daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use autoupdate::deps::NpmInstaller;
use autoupdate::reload::{CommandReload, NoopReload, ReloadTrigger};
use autoupdate::scheduler::UpdateService;
use autoupdate::version::HttpVersionSource;
use autoupdate::watch::WatchRegistry;

use super::common::load_config;

pub(crate) async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let registry = WatchRegistry::new();
    let mut guards = Vec::with_capacity(config.watch.len());
    for entry in &config.watch {
        let guard = registry
            .watch(entry.name.clone(), entry.interval_ms, false, entry.endpoint.clone())
            .with_context(|| format!("Failed to watch {}", entry.name))?;
        guards.push(guard);
    }
    if guards.is_empty() {
        println!("No packages configured under \"watch\"; nothing to do.");
        return Ok(());
    }

    let installer = NpmInstaller::from_config(&config.installer);
    let source = HttpVersionSource::from_config(&config.http)
        .context("Failed to build registry HTTP client")?;
    let reloader: Arc<dyn ReloadTrigger> = match CommandReload::from_config(&config.reload) {
        Some(command) => Arc::new(command),
        None => Arc::new(NoopReload),
    };

    let service = UpdateService::new(
        registry.clone(),
        Arc::new(installer),
        Arc::new(source),
        reloader,
        &config.scheduler,
    );

    println!(
        "Watching {} package(s): {}",
        registry.len(),
        registry.names().join(", ")
    );
    service.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");

    service.stop().await;
    drop(guards);
    println!("Stopped.");
    Ok(())
}
