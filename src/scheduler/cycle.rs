//! One scheduler cycle: the per-target decision pipeline and reload aggregation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::deps::{install_target, DepMap, Installer};
use crate::error::{AutoupdateError, Result};
use crate::hooks::{panic_message, run_hook, HookContext};
use crate::reload::ReloadTrigger;
use crate::version::{effective_endpoint, is_update_available, resolve_latest, VersionSource};
use crate::watch::{TargetSnapshot, WatchRegistry};

/// What happened to one target during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Watch interval has not elapsed.
    Debounced,
    /// No usable latest version; retried next cycle.
    FetchFailed,
    /// The installer does not report the target as installed.
    NotInstalled,
    /// Installed version is already the newest.
    UpToDate { current: String },
    /// The update hook vetoed the install.
    UpdateVetoed { latest: String, current: String },
    /// The installer failed; retried next cycle.
    InstallFailed { latest: String },
    /// Installed the newer version.
    Installed {
        from: String,
        to: String,
        reload_vetoed: bool,
    },
}

impl TargetOutcome {
    /// Whether the target's debounce timestamp was advanced.
    pub fn handled(&self) -> bool {
        matches!(
            self,
            TargetOutcome::UpdateVetoed { .. } | TargetOutcome::Installed { .. }
        )
    }
}

/// Whether and how the reload trigger ran.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReloadStatus {
    #[default]
    NotRequired,
    Triggered,
    Failed(String),
}

/// Record of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle time, on the `now_ms()` clock.
    pub at_ms: i64,
    /// Set when the whole cycle was skipped, e.g. the installer was unreadable.
    pub skipped: Option<String>,
    pub outcomes: Vec<(String, TargetOutcome)>,
    pub reload: ReloadStatus,
}

impl CycleReport {
    fn new(at_ms: i64) -> Self {
        Self {
            at_ms,
            skipped: None,
            outcomes: Vec::new(),
            reload: ReloadStatus::NotRequired,
        }
    }

    fn skipped(at_ms: i64, reason: String) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(at_ms)
        }
    }

    /// Outcome for a target, if it was part of the cycle.
    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// Whether the reload trigger was invoked, successfully or not.
    pub fn reload_invoked(&self) -> bool {
        !matches!(self.reload, ReloadStatus::NotRequired)
    }

    /// Number of targets installed this cycle.
    pub fn installed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TargetOutcome::Installed { .. }))
            .count()
    }
}

/// Aggregate state of a single cycle.
#[derive(Debug, Default)]
struct CycleState {
    require_reload: bool,
}

/// Everything a cycle needs. Cheap to clone into the loop task.
#[derive(Clone)]
pub struct CycleRunner {
    registry: WatchRegistry,
    installer: Arc<dyn Installer>,
    source: Arc<dyn VersionSource>,
    reloader: Arc<dyn ReloadTrigger>,
    default_endpoint: Option<String>,
}

impl CycleRunner {
    pub fn new(
        registry: WatchRegistry,
        installer: Arc<dyn Installer>,
        source: Arc<dyn VersionSource>,
        reloader: Arc<dyn ReloadTrigger>,
        default_endpoint: Option<String>,
    ) -> Self {
        Self {
            registry,
            installer,
            source,
            reloader,
            default_endpoint,
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Run one full pass over the registry at time `now_ms`.
    pub async fn run_cycle_at(&self, now_ms: i64) -> CycleReport {
        let deps = match self.installer.get_deps().await {
            Ok(deps) => deps,
            Err(e) => {
                warn!("Failed to read installed dependencies, skipping cycle: {}", e);
                return CycleReport::skipped(now_ms, e.to_string());
            }
        };

        let fallback = self
            .default_endpoint
            .clone()
            .or_else(|| self.installer.endpoint());

        let mut state = CycleState::default();
        let mut report = CycleReport::new(now_ms);
        for target in self.registry.snapshot() {
            let outcome = self
                .evaluate(&target, &deps, fallback.as_deref(), now_ms, &mut state)
                .await;
            report.outcomes.push((target.name, outcome));
        }

        if state.require_reload {
            report.reload = match self.reload().await {
                Ok(()) => ReloadStatus::Triggered,
                Err(e) => {
                    warn!("Reload failed: {}", e);
                    ReloadStatus::Failed(e.to_string())
                }
            };
        }
        report
    }

    /// Invoke the reload trigger, converting a panic into `Reload` error.
    pub async fn reload(&self) -> Result<()> {
        match AssertUnwindSafe(self.reloader.reload()).catch_unwind().await {
            Ok(Ok(())) => {
                info!("Host reloaded");
                Ok(())
            }
            Ok(Err(AutoupdateError::Reload(msg))) => Err(AutoupdateError::Reload(msg)),
            Ok(Err(e)) => Err(AutoupdateError::Reload(e.to_string())),
            Err(panic) => Err(AutoupdateError::Reload(format!(
                "reload panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    async fn evaluate(
        &self,
        target: &TargetSnapshot,
        deps: &DepMap,
        fallback: Option<&str>,
        now_ms: i64,
        state: &mut CycleState,
    ) -> TargetOutcome {
        let name = target.name.as_str();
        if !target.is_due(now_ms) {
            return TargetOutcome::Debounced;
        }

        let endpoint = effective_endpoint(target.endpoint.as_deref(), fallback);
        let Some(latest) = resolve_latest(self.source.as_ref(), name, &endpoint).await else {
            return TargetOutcome::FetchFailed;
        };

        let Some(current) = deps.get(name).map(|d| d.resolved.clone()) else {
            debug!(package = %name, "Not installed, skipping");
            return TargetOutcome::NotInstalled;
        };
        if !is_update_available(Some(&latest), Some(&current)) {
            debug!(package = %name, %current, "Up to date");
            return TargetOutcome::UpToDate { current };
        }
        info!(package = %name, %latest, %current, "Update available");

        let update_ctx = HookContext::update(name, &latest, &current);
        if run_hook(&self.registry, update_ctx).await == Some(true) {
            info!(package = %name, %latest, "Update vetoed by hook");
            self.registry.mark_called(name, target.registration, now_ms);
            return TargetOutcome::UpdateVetoed { latest, current };
        }

        if install_target(self.installer.as_ref(), name, &latest)
            .await
            .is_err()
        {
            return TargetOutcome::InstallFailed { latest };
        }

        let reload_vetoed = run_hook(&self.registry, HookContext::reload(name)).await == Some(true);
        if reload_vetoed {
            debug!(package = %name, "Reload vetoed by hook");
        } else {
            state.require_reload = true;
        }

        self.registry.mark_called(name, target.registration, now_ms);
        TargetOutcome::Installed {
            from: current,
            to: latest,
            reload_vetoed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::installer::MockInstaller;
    use crate::deps::ResolvedDep;
    use crate::hooks::hook_fn;
    use crate::reload::MockReloadTrigger;
    use crate::version::FetchResponse;
    use crate::watch::HookKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000_000;

    /// Serves fixed versions per package, counting requests.
    #[derive(Default)]
    struct MapSource {
        versions: HashMap<String, String>,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                versions: pairs
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl VersionSource for MapSource {
        async fn fetch(&self, url: &str) -> FetchResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            let name = url
                .trim_end_matches("/latest")
                .rsplit('/')
                .next()
                .unwrap_or_default();
            match self.versions.get(name) {
                Some(v) => FetchResponse::ok(json!({ "version": v })),
                None => FetchResponse::failed(-1, "not found"),
            }
        }
    }

    fn deps(pairs: &[(&str, &str)]) -> DepMap {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), ResolvedDep::new(*v)))
            .collect()
    }

    fn installer_with(installed: &[(&str, &str)]) -> MockInstaller {
        let deps = deps(installed);
        let mut installer = MockInstaller::new();
        installer
            .expect_get_deps()
            .returning(move || Ok(deps.clone()));
        installer.expect_endpoint().returning(|| None);
        installer
    }

    fn runner(
        registry: &WatchRegistry,
        installer: MockInstaller,
        source: Arc<MapSource>,
        reloader: MockReloadTrigger,
    ) -> CycleRunner {
        CycleRunner::new(
            registry.clone(),
            Arc::new(installer),
            source,
            Arc::new(reloader),
            None,
        )
    }

    fn watched(names: &[&str]) -> WatchRegistry {
        let registry = WatchRegistry::new();
        for name in names {
            registry.watch(*name, 1_000, false, None).unwrap().detach();
        }
        registry
    }

    #[tokio::test]
    async fn test_install_then_single_reload() {
        let registry = watched(&["pkg-a", "pkg-b"]);
        let mut installer = installer_with(&[("pkg-a", "1.0.0"), ("pkg-b", "2.0.0")]);
        installer.expect_install().times(2).returning(|_| Ok(()));
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().times(1).returning(|| Ok(()));
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0"), ("pkg-b", "2.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;

        assert_eq!(report.installed(), 2);
        assert_eq!(report.reload, ReloadStatus::Triggered);
        assert_eq!(registry.last_call_ms("pkg-a"), Some(NOW));
        assert_eq!(registry.last_call_ms("pkg-b"), Some(NOW));
    }

    #[tokio::test]
    async fn test_debounced_target_is_not_fetched() {
        let registry = watched(&["pkg-a"]);
        let reg = registry.snapshot()[0].registration;
        registry.mark_called("pkg-a", reg, NOW - 500);

        let installer = installer_with(&[("pkg-a", "1.0.0")]);
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));
        let report = runner(&registry, installer, Arc::clone(&source), MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;

        assert_eq!(report.outcome("pkg-a"), Some(&TargetOutcome::Debounced));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(!report.reload_invoked());
    }

    #[tokio::test]
    async fn test_up_to_date_keeps_timestamp() {
        let registry = watched(&["pkg-a"]);
        let installer = installer_with(&[("pkg-a", "1.1.0")]);
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));
        let report = runner(&registry, installer, source, MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;

        assert_eq!(
            report.outcome("pkg-a"),
            Some(&TargetOutcome::UpToDate {
                current: "1.1.0".into()
            })
        );
        assert_eq!(registry.last_call_ms("pkg-a"), Some(0));
    }

    #[tokio::test]
    async fn test_not_installed_is_skipped() {
        let registry = watched(&["pkg-a"]);
        let installer = installer_with(&[]);
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));
        let report = runner(&registry, installer, source, MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;
        assert_eq!(report.outcome("pkg-a"), Some(&TargetOutcome::NotInstalled));
    }

    #[tokio::test]
    async fn test_update_veto_skips_install_but_marks_handled() {
        let registry = watched(&["pkg-a"]);
        registry
            .before("pkg-a", HookKind::Update, hook_fn(|_| async { Ok(true) }), false)
            .unwrap()
            .detach();
        let mut installer = installer_with(&[("pkg-a", "1.0.0")]);
        installer.expect_install().never();
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().never();
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;

        assert!(matches!(
            report.outcome("pkg-a"),
            Some(TargetOutcome::UpdateVetoed { .. })
        ));
        assert_eq!(registry.last_call_ms("pkg-a"), Some(NOW));
        assert!(!report.reload_invoked());
    }

    #[tokio::test]
    async fn test_failing_update_hook_does_not_veto() {
        let registry = watched(&["pkg-a"]);
        registry
            .before(
                "pkg-a",
                HookKind::Update,
                hook_fn(|_| async { Err(AutoupdateError::Hook("broken".into())) }),
                false,
            )
            .unwrap()
            .detach();
        let mut installer = installer_with(&[("pkg-a", "1.0.0")]);
        installer.expect_install().times(1).returning(|_| Ok(()));
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().times(1).returning(|| Ok(()));
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;
        assert_eq!(report.installed(), 1);
    }

    #[tokio::test]
    async fn test_reload_veto_suppresses_reload() {
        let registry = watched(&["pkg-a"]);
        registry
            .before("pkg-a", HookKind::Reload, hook_fn(|_| async { Ok(true) }), false)
            .unwrap()
            .detach();
        let mut installer = installer_with(&[("pkg-a", "1.0.0")]);
        installer.expect_install().times(1).returning(|_| Ok(()));
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().never();
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;

        assert_eq!(
            report.outcome("pkg-a"),
            Some(&TargetOutcome::Installed {
                from: "1.0.0".into(),
                to: "1.1.0".into(),
                reload_vetoed: true
            })
        );
        assert_eq!(registry.last_call_ms("pkg-a"), Some(NOW));
    }

    #[tokio::test]
    async fn test_reload_veto_does_not_cancel_other_targets() {
        let registry = watched(&["pkg-a", "pkg-b"]);
        registry
            .before("pkg-b", HookKind::Reload, hook_fn(|_| async { Ok(true) }), false)
            .unwrap()
            .detach();
        let mut installer = installer_with(&[("pkg-a", "1.0.0"), ("pkg-b", "1.0.0")]);
        installer.expect_install().times(2).returning(|_| Ok(()));
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().times(1).returning(|| Ok(()));
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0"), ("pkg-b", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;
        assert_eq!(report.reload, ReloadStatus::Triggered);
    }

    #[tokio::test]
    async fn test_install_failure_keeps_timestamp_and_skips_reload_hook() {
        let registry = watched(&["pkg-a"]);
        let reload_hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&reload_hook_calls);
        registry
            .before(
                "pkg-a",
                HookKind::Reload,
                hook_fn(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(false) }
                }),
                false,
            )
            .unwrap()
            .detach();
        let mut installer = installer_with(&[("pkg-a", "1.0.0")]);
        installer
            .expect_install()
            .times(1)
            .returning(|_| Err(AutoupdateError::Install("EACCES".into())));
        let mut reloader = MockReloadTrigger::new();
        reloader.expect_reload().never();
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;

        assert_eq!(
            report.outcome("pkg-a"),
            Some(&TargetOutcome::InstallFailed {
                latest: "1.1.0".into()
            })
        );
        assert_eq!(registry.last_call_ms("pkg-a"), Some(0));
        assert_eq!(reload_hook_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_retried_next_cycle() {
        let registry = WatchRegistry::new();
        registry
            .watch("pkg-a", 60_000, false, None)
            .unwrap()
            .detach();
        let installer = installer_with(&[("pkg-a", "1.0.0")]);
        let source = Arc::new(MapSource::default());
        let runner = runner(&registry, installer, Arc::clone(&source), MockReloadTrigger::new());

        let first = runner.run_cycle_at(NOW).await;
        let second = runner.run_cycle_at(NOW + 5).await;

        assert_eq!(first.outcome("pkg-a"), Some(&TargetOutcome::FetchFailed));
        assert_eq!(second.outcome("pkg-a"), Some(&TargetOutcome::FetchFailed));
        // Not debounced: the interval is 60s but the second cycle is 5ms later.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.last_call_ms("pkg-a"), Some(0));
    }

    #[tokio::test]
    async fn test_get_deps_failure_skips_cycle() {
        let registry = watched(&["pkg-a"]);
        let mut installer = MockInstaller::new();
        installer
            .expect_get_deps()
            .returning(|| Err(AutoupdateError::Install("npm missing".into())));
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, Arc::clone(&source), MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;

        assert!(report.skipped.is_some());
        assert!(report.outcomes.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported_not_fatal() {
        let registry = watched(&["pkg-a"]);
        let mut installer = installer_with(&[("pkg-a", "1.0.0")]);
        installer.expect_install().returning(|_| Ok(()));
        let mut reloader = MockReloadTrigger::new();
        reloader
            .expect_reload()
            .times(1)
            .returning(|| Err(AutoupdateError::Config("host busy".into())));
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, reloader)
            .run_cycle_at(NOW)
            .await;

        assert!(matches!(report.reload, ReloadStatus::Failed(ref msg) if msg.contains("host busy")));
        assert_eq!(registry.last_call_ms("pkg-a"), Some(NOW));
    }

    #[tokio::test]
    async fn test_endpoint_precedence() {
        let registry = WatchRegistry::new();
        registry
            .watch("pkg-a", 1_000, false, Some("https://own.example".into()))
            .unwrap()
            .detach();
        registry.watch("pkg-b", 1_000, false, None).unwrap().detach();

        let deps = deps(&[]);
        let mut installer = MockInstaller::new();
        installer
            .expect_get_deps()
            .returning(move || Ok(deps.clone()));
        installer
            .expect_endpoint()
            .returning(|| Some("https://installer.example".into()));
        let source = Arc::new(MapSource::default());

        runner(&registry, installer, Arc::clone(&source), MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;

        let urls = source.urls.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec![
                "https://own.example/pkg-a/latest",
                "https://installer.example/pkg-b/latest"
            ]
        );
    }

    #[tokio::test]
    async fn test_unwatch_from_hook_mid_cycle() {
        let registry = watched(&["pkg-a", "pkg-b"]);
        let handle = registry.clone();
        registry
            .before(
                "pkg-a",
                HookKind::Update,
                hook_fn(move |_| {
                    let handle = handle.clone();
                    async move {
                        handle.unwatch("pkg-b", true)?;
                        Ok(true)
                    }
                }),
                false,
            )
            .unwrap()
            .detach();
        let installer = installer_with(&[("pkg-a", "1.0.0"), ("pkg-b", "1.0.0")]);
        let source = Arc::new(MapSource::with(&[("pkg-a", "1.1.0")]));

        let report = runner(&registry, installer, source, MockReloadTrigger::new())
            .run_cycle_at(NOW)
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcome("pkg-b"), Some(&TargetOutcome::FetchFailed));
        assert!(!registry.contains("pkg-b"));
    }
}
