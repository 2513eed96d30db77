//! Update service: owns the background poll loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::deps::Installer;
use crate::error::Result;
use crate::reload::ReloadTrigger;
use crate::utils::now_ms;
use crate::version::VersionSource;
use crate::watch::WatchRegistry;

use super::cycle::{CycleReport, CycleRunner};

/// Skipped cycles in a row before the loop starts warning.
const SKIP_ALERT_THRESHOLD: u32 = 3;

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background service that repeatedly runs update cycles over a registry.
pub struct UpdateService {
    runner: CycleRunner,
    tick_delay: Duration,
    worker: Mutex<Option<Worker>>,
    /// Count of consecutive skipped cycles.
    consecutive_skips: Arc<AtomicU32>,
}

impl UpdateService {
    /// Create a new update service. Nothing runs until [`start`](Self::start).
    pub fn new(
        registry: WatchRegistry,
        installer: Arc<dyn Installer>,
        source: Arc<dyn VersionSource>,
        reloader: Arc<dyn ReloadTrigger>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            runner: CycleRunner::new(
                registry,
                installer,
                source,
                reloader,
                config.endpoint.clone(),
            ),
            tick_delay: config.tick_delay(),
            worker: Mutex::new(None),
            consecutive_skips: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        self.runner.registry()
    }

    /// Start the poll loop in the background. Calling it again while running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!("Update service already running");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = self.runner.clone();
        let tick_delay = self.tick_delay;
        let consecutive_skips = Arc::clone(&self.consecutive_skips);

        info!(
            "Update service started (tick_delay={}ms, targets={})",
            tick_delay.as_millis(),
            runner.registry().len()
        );

        let handle = tokio::spawn(async move {
            loop {
                let report = runner.run_cycle_at(now_ms()).await;
                Self::record(&report, &consecutive_skips);

                tokio::select! {
                    _ = tokio::time::sleep(tick_delay) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            crate::log_component!(info, "scheduler", "Update service stopped");
        });

        *worker = Some(Worker { shutdown, handle });
    }

    /// Signal the loop to stop and wait for the in-flight cycle to finish.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!("Update loop ended abnormally: {}", e);
        }
    }

    /// Returns whether the poll loop is running.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Run a single cycle now, independent of the background loop.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(now_ms()).await
    }

    /// Run a single cycle as if the current time were `now_ms`.
    pub async fn run_cycle_at(&self, now_ms: i64) -> CycleReport {
        let report = self.runner.run_cycle_at(now_ms).await;
        Self::record(&report, &self.consecutive_skips);
        report
    }

    /// Invoke the reload trigger directly.
    pub async fn reload(&self) -> Result<()> {
        self.runner.reload().await
    }

    /// Returns the current count of consecutive skipped cycles.
    pub fn consecutive_skips(&self) -> u32 {
        self.consecutive_skips.load(Ordering::Relaxed)
    }

    fn record(report: &CycleReport, consecutive_skips: &AtomicU32) {
        if report.skipped.is_some() {
            let count = consecutive_skips.fetch_add(1, Ordering::Relaxed) + 1;
            if count == SKIP_ALERT_THRESHOLD || (count > 0 && count % 1000 == 0) {
                warn!(
                    consecutive_skips = count,
                    "{} consecutive cycles skipped, installer may be unavailable", count
                );
            }
        } else {
            consecutive_skips.store(0, Ordering::Relaxed);
            if report.installed() > 0 {
                info!(
                    installed = report.installed(),
                    reload = ?report.reload,
                    "Cycle finished"
                );
            } else {
                crate::log_component!(
                    debug,
                    "scheduler",
                    "Cycle finished",
                    targets = report.outcomes.len()
                );
            }
        }
    }
}

impl Drop for UpdateService {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.shutdown.send(true);
        }
    }
}
