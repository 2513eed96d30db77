//! Autoupdate - Keep host plugins current by polling their package registry

pub mod config;
pub mod deps;
pub mod error;
pub mod hooks;
pub mod reload;
pub mod scheduler;
pub mod utils;
pub mod version;
pub mod watch;

pub use config::Config;
pub use deps::{DepMap, Installer, NpmInstaller, ResolvedDep};
pub use error::{AutoupdateError, Result};
pub use hooks::{hook_fn, Hook, HookContext};
pub use reload::{reload_fn, CommandReload, NoopReload, ReloadTrigger};
pub use scheduler::{CycleReport, ReloadStatus, TargetOutcome, UpdateService};
pub use version::{FetchResponse, HttpVersionSource, VersionSource};
pub use watch::{HookGuard, HookKind, WatchGuard, WatchRegistry};
