//! `autoupdate check`: one-shot version comparison for a single package.

use std::path::PathBuf;

use anyhow::{Context, Result};

use autoupdate::deps::{Installer, NpmInstaller};
use autoupdate::version::{effective_endpoint, is_update_available, resolve_latest, HttpVersionSource};

use super::common::load_config;

pub(crate) async fn cmd_check(
    name: &str,
    endpoint: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let installer = NpmInstaller::from_config(&config.installer);
    let source = HttpVersionSource::from_config(&config.http)
        .context("Failed to build registry HTTP client")?;

    let configured = config
        .watch
        .iter()
        .find(|entry| entry.name == name)
        .and_then(|entry| entry.endpoint.clone());
    let fallback = config.scheduler.endpoint.clone().or_else(|| installer.endpoint());
    let endpoint = effective_endpoint(
        endpoint.as_deref().or(configured.as_deref()),
        fallback.as_deref(),
    );

    let latest = resolve_latest(&source, name, &endpoint).await;
    let deps = installer
        .get_deps()
        .await
        .with_context(|| format!("Failed to list packages in {}", installer.prefix().display()))?;
    let current = deps.get(name).map(|dep| dep.resolved.clone());

    println!("{}", name);
    println!("  registry:  {}", endpoint);
    println!("  latest:    {}", latest.as_deref().unwrap_or("(unavailable)"));
    println!("  installed: {}", current.as_deref().unwrap_or("(not installed)"));
    println!(
        "  update:    {}",
        if is_update_available(latest.as_deref(), current.as_deref()) {
            "available"
        } else {
            "none"
        }
    );
    Ok(())
}
