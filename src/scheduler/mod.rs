//! Poll scheduler: the update loop and its per-cycle decision pipeline.
//!
//! Each cycle reads the installed dependencies once, walks a snapshot of the
//! watch registry in registration order, and triggers at most one host reload.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use autoupdate::config::SchedulerConfig;
//! use autoupdate::deps::NpmInstaller;
//! use autoupdate::reload::NoopReload;
//! use autoupdate::scheduler::UpdateService;
//! use autoupdate::version::HttpVersionSource;
//! use autoupdate::watch::WatchRegistry;
//!
//! # tokio_test::block_on(async {
//! let registry = WatchRegistry::new();
//! let _watch = registry.watch("koishi-plugin-foo", 60_000, false, None).unwrap();
//!
//! let service = UpdateService::new(
//!     registry.clone(),
//!     Arc::new(NpmInstaller::new("/srv/bot")),
//!     Arc::new(HttpVersionSource::new(None).unwrap()),
//!     Arc::new(NoopReload),
//!     &SchedulerConfig::default(),
//! );
//! let report = service.run_cycle().await;
//! println!("{} installed", report.installed());
//! # });
//! ```

pub mod cycle;
pub mod service;

pub use cycle::{CycleReport, CycleRunner, ReloadStatus, TargetOutcome};
pub use service::UpdateService;
