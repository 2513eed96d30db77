//! Install orchestration: delegates single-artifact installs to the host's installer.
//!
//! The host declares its package manager through the `Installer` trait.
//! `NpmInstaller` is the stock implementation for Node-style plugin hosts.

pub mod installer;
pub mod npm;
pub mod types;

pub use installer::{install_target, Installer};
pub use npm::NpmInstaller;
pub use types::{parse_npm_ls, DepMap, ResolvedDep};
