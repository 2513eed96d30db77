//! In-memory registry of watched targets and their hooks.
//!
//! The registry is shared between the polling loop (which advances debounce
//! timestamps) and callers of the registration API. All state sits behind a
//! single `parking_lot::RwLock` that is never held across an await point;
//! the loop iterates over [`WatchRegistry::snapshot`] rather than the live map.
//!
//! `watch` and `before` return guards. Dropping a guard undoes the
//! registration it belongs to, which ties a target's lifetime to whoever
//! registered it. Call `detach()` to keep the registration instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AutoupdateError, Result};
use crate::hooks::Hook;

use super::types::{HookKind, HookSlot, HookSlots, TargetSnapshot, WatchTarget};

/// Intervals below this are accepted but logged as risky.
pub const MIN_SAFE_INTERVAL_MS: u64 = 1_000;

#[derive(Default)]
struct RegistryInner {
    targets: RwLock<Vec<WatchTarget>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Shared, cloneable handle to the set of watched targets.
#[derive(Clone, Default)]
pub struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `name`.
    ///
    /// Fails with `DuplicateTarget` when the name is already watched and
    /// `force` is false. With `force`, the existing entry is replaced in
    /// place: its hooks are cleared and its timestamp reset to 0.
    pub fn watch(
        &self,
        name: impl Into<String>,
        interval_ms: u64,
        force: bool,
        endpoint: Option<String>,
    ) -> Result<WatchGuard> {
        let name = name.into();
        if interval_ms < MIN_SAFE_INTERVAL_MS {
            warn!(
                package = %name,
                interval_ms,
                "Watch interval below {}ms may hammer the registry",
                MIN_SAFE_INTERVAL_MS
            );
        }

        let registration = self.inner.next_id();
        let target = WatchTarget {
            name: name.clone(),
            registration,
            last_call_ms: 0,
            watch_interval_ms: interval_ms,
            endpoint,
            hooks: HookSlots::default(),
        };

        {
            let mut targets = self.inner.targets.write();
            match targets.iter_mut().find(|t| t.name == name) {
                Some(_) if !force => return Err(AutoupdateError::DuplicateTarget(name)),
                Some(existing) => {
                    info!(package = %name, "Replacing existing watch");
                    *existing = target;
                }
                None => targets.push(target),
            }
        }

        info!(package = %name, interval_ms, "Watching for updates");
        Ok(WatchGuard {
            registry: Arc::downgrade(&self.inner),
            name,
            registration,
            detached: false,
        })
    }

    /// Stop watching `name`.
    pub fn unwatch(&self, name: &str, ignore_error: bool) -> Result<()> {
        let mut targets = self.inner.targets.write();
        let before = targets.len();
        targets.retain(|t| t.name != name);
        if targets.len() == before {
            if ignore_error {
                return Ok(());
            }
            return Err(AutoupdateError::UnknownTarget(name.to_string()));
        }
        info!(package = %name, "Stopped watching");
        Ok(())
    }

    /// Register a hook for `name` at checkpoint `kind`.
    pub fn before(
        &self,
        name: &str,
        kind: HookKind,
        hook: Arc<dyn Hook>,
        force: bool,
    ) -> Result<HookGuard> {
        self.before_on(name, None, kind, hook, force)
    }

    /// Register a hook, optionally only on the entry created by `registration`.
    fn before_on(
        &self,
        name: &str,
        registration: Option<u64>,
        kind: HookKind,
        hook: Arc<dyn Hook>,
        force: bool,
    ) -> Result<HookGuard> {
        let id = self.inner.next_id();
        {
            let mut targets = self.inner.targets.write();
            let target = find_target(&mut targets, name, registration)
                .ok_or_else(|| AutoupdateError::UnknownTarget(name.to_string()))?;
            let slot = target.hooks.slot_mut(kind);
            if slot.is_some() && !force {
                return Err(AutoupdateError::DuplicateHook {
                    name: name.to_string(),
                    kind,
                });
            }
            *slot = Some(HookSlot { id, hook });
        }

        debug!(package = %name, hook = %kind, "Hook registered");
        Ok(HookGuard {
            registry: Arc::downgrade(&self.inner),
            name: name.to_string(),
            kind,
            id,
            detached: false,
        })
    }

    /// Remove the hook registered for `name` at checkpoint `kind`.
    pub fn off(&self, name: &str, kind: HookKind, ignore_error: bool) -> Result<()> {
        self.off_on(name, None, kind, ignore_error)
    }

    fn off_on(
        &self,
        name: &str,
        registration: Option<u64>,
        kind: HookKind,
        ignore_error: bool,
    ) -> Result<()> {
        let mut targets = self.inner.targets.write();
        let Some(target) = find_target(&mut targets, name, registration) else {
            if ignore_error {
                return Ok(());
            }
            return Err(AutoupdateError::UnknownTarget(name.to_string()));
        };
        let slot = target.hooks.slot_mut(kind);
        if slot.is_none() && !ignore_error {
            return Err(AutoupdateError::UnknownHook {
                name: name.to_string(),
                kind,
            });
        }
        *slot = None;
        Ok(())
    }

    /// Check if a target is watched.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.targets.read().iter().any(|t| t.name == name)
    }

    /// Number of watched targets.
    pub fn len(&self) -> usize {
        self.inner.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watched names in iteration order.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .targets
            .read()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// Whether a hook of `kind` is registered for `name`.
    pub fn has_hook(&self, name: &str, kind: HookKind) -> bool {
        self.inner
            .targets
            .read()
            .iter()
            .any(|t| t.name == name && t.hooks.get(kind).is_some())
    }

    /// Timestamp of the last handled evaluation of `name`.
    pub fn last_call_ms(&self, name: &str) -> Option<i64> {
        self.inner
            .targets
            .read()
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.last_call_ms)
    }

    /// Stable copy of every target, in iteration order.
    pub fn snapshot(&self) -> Vec<TargetSnapshot> {
        self.inner
            .targets
            .read()
            .iter()
            .map(WatchTarget::snapshot)
            .collect()
    }

    /// Clone the hook for `name`/`kind` so it can be awaited without the lock.
    pub(crate) fn hook(&self, name: &str, kind: HookKind) -> Option<Arc<dyn Hook>> {
        self.inner
            .targets
            .read()
            .iter()
            .find(|t| t.name == name)
            .and_then(|t| t.hooks.get(kind))
            .map(|slot| Arc::clone(&slot.hook))
    }

    /// Advance the debounce timestamp, provided the target was not removed or
    /// replaced since `registration` was observed. Returns whether it was updated.
    pub(crate) fn mark_called(&self, name: &str, registration: u64, now_ms: i64) -> bool {
        let mut targets = self.inner.targets.write();
        match targets
            .iter_mut()
            .find(|t| t.name == name && t.registration == registration)
        {
            Some(target) => {
                target.last_call_ms = now_ms;
                true
            }
            None => {
                debug!(package = %name, "Target changed mid-cycle, timestamp not advanced");
                false
            }
        }
    }
}

/// Live entry for `name`; with `registration`, only if it has not been replaced.
fn find_target<'a>(
    targets: &'a mut [WatchTarget],
    name: &str,
    registration: Option<u64>,
) -> Option<&'a mut WatchTarget> {
    targets
        .iter_mut()
        .find(|t| t.name == name && registration.map_or(true, |r| t.registration == r))
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("targets", &self.names())
            .finish()
    }
}

/// Ownership token for a watch registration.
///
/// Dropping it unwatches the target unless the target has since been
/// replaced by another registration.
#[must_use = "dropping a WatchGuard unwatches the target; call detach() to keep it"]
pub struct WatchGuard {
    registry: Weak<RegistryInner>,
    name: String,
    registration: u64,
    detached: bool,
}

impl WatchGuard {
    /// Name of the watched target.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> Result<WatchRegistry> {
        self.registry
            .upgrade()
            .map(|inner| WatchRegistry { inner })
            .ok_or_else(|| AutoupdateError::UnknownTarget(self.name.clone()))
    }

    /// Register a hook for this target.
    ///
    /// Fails with `UnknownTarget` once the watch has been removed or
    /// force-replaced by another registration.
    pub fn before(&self, kind: HookKind, hook: Arc<dyn Hook>, force: bool) -> Result<HookGuard> {
        self.registry()?
            .before_on(&self.name, Some(self.registration), kind, hook, force)
    }

    /// Remove this target's hook of `kind`. A replaced watch counts as unknown.
    pub fn off(&self, kind: HookKind, ignore_error: bool) -> Result<()> {
        match self.registry() {
            Ok(registry) => {
                registry.off_on(&self.name, Some(self.registration), kind, ignore_error)
            }
            Err(_) if ignore_error => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Keep the registration alive after this guard is dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut targets = inner.targets.write();
        let before = targets.len();
        targets.retain(|t| !(t.name == self.name && t.registration == self.registration));
        if targets.len() < before {
            debug!(package = %self.name, "Watch released");
        }
    }
}

/// Ownership token for a hook registration.
#[must_use = "dropping a HookGuard removes the hook; call detach() to keep it"]
pub struct HookGuard {
    registry: Weak<RegistryInner>,
    name: String,
    kind: HookKind,
    id: u64,
    detached: bool,
}

impl HookGuard {
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    /// Keep the hook registered after this guard is dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut targets = inner.targets.write();
        if let Some(target) = targets.iter_mut().find(|t| t.name == self.name) {
            let slot = target.hooks.slot_mut(self.kind);
            if slot.as_ref().is_some_and(|s| s.id == self.id) {
                *slot = None;
                debug!(package = %self.name, hook = %self.kind, "Hook released");
            }
        }
    }
}
