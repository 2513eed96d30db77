//! Installer trait and the install orchestrator.
//!
//! `Installer` abstracts the package manager for testability.
//! `install_target` is the single-artifact install step of the update pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{AutoupdateError, Result};

use super::types::DepMap;

/// The host's package installer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Installer: Send + Sync {
    /// Currently installed dependencies.
    async fn get_deps(&self) -> Result<DepMap>;

    /// Install every `name -> version` pair in `deps`.
    async fn install(&self, deps: &HashMap<String, String>) -> Result<()>;

    /// Registry the installer itself is configured with, if any.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Install `name@version` through `installer`.
///
/// Any failure is logged and returned as `AutoupdateError::Install`.
pub async fn install_target(installer: &dyn Installer, name: &str, version: &str) -> Result<()> {
    let mut deps = HashMap::new();
    deps.insert(name.to_string(), version.to_string());

    info!(package = %name, %version, "Installing");
    match installer.install(&deps).await {
        Ok(()) => {
            info!(package = %name, %version, "Installed");
            Ok(())
        }
        Err(e) => {
            let err = match e {
                AutoupdateError::Install(_) => e,
                other => AutoupdateError::Install(other.to_string()),
            };
            warn!(package = %name, %version, "Failed to install latest version: {}", err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_target_passes_single_entry() {
        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .withf(|deps| deps.len() == 1 && deps.get("pkg-a").map(String::as_str) == Some("1.1.0"))
            .times(1)
            .returning(|_| Ok(()));

        assert!(install_target(&installer, "pkg-a", "1.1.0").await.is_ok());
    }

    #[tokio::test]
    async fn test_install_target_maps_errors() {
        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .times(1)
            .returning(|_| Err(AutoupdateError::Config("npm missing".into())));

        let err = install_target(&installer, "pkg-a", "1.1.0").await.unwrap_err();
        assert!(matches!(err, AutoupdateError::Install(ref msg) if msg.contains("npm missing")));
    }

    #[tokio::test]
    async fn test_install_target_keeps_install_errors() {
        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .returning(|_| Err(AutoupdateError::Install("E404".into())));

        let err = install_target(&installer, "pkg-a", "9.9.9").await.unwrap_err();
        assert_eq!(err.to_string(), "Install error: E404");
    }
}
