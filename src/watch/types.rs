//! Watch target and checkpoint types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hooks::Hook;

/// Checkpoint in the update pipeline where a hook may intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// After a newer version is found, before install.
    Update,
    /// After install, before reload aggregation.
    Reload,
}

impl HookKind {
    /// Label passed to hooks and used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            HookKind::Update => "update",
            HookKind::Reload => "reload",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A registered hook together with the id of the registration that installed it.
#[derive(Clone)]
pub(crate) struct HookSlot {
    pub(crate) id: u64,
    pub(crate) hook: Arc<dyn Hook>,
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlot").field("id", &self.id).finish()
    }
}

/// One optional slot per checkpoint kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct HookSlots {
    update: Option<HookSlot>,
    reload: Option<HookSlot>,
}

impl HookSlots {
    pub(crate) fn get(&self, kind: HookKind) -> Option<&HookSlot> {
        match kind {
            HookKind::Update => self.update.as_ref(),
            HookKind::Reload => self.reload.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, kind: HookKind) -> &mut Option<HookSlot> {
        match kind {
            HookKind::Update => &mut self.update,
            HookKind::Reload => &mut self.reload,
        }
    }
}

/// A named artifact being watched for new versions.
#[derive(Debug, Clone)]
pub(crate) struct WatchTarget {
    pub(crate) name: String,
    /// Id of the `watch` call that created this entry.
    pub(crate) registration: u64,
    /// Epoch milliseconds of the last handled evaluation, 0 if never.
    pub(crate) last_call_ms: i64,
    pub(crate) watch_interval_ms: u64,
    pub(crate) endpoint: Option<String>,
    pub(crate) hooks: HookSlots,
}

impl WatchTarget {
    pub(crate) fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            name: self.name.clone(),
            registration: self.registration,
            last_call_ms: self.last_call_ms,
            watch_interval_ms: self.watch_interval_ms,
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Read-only copy of a watch target, taken once per scheduler cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSnapshot {
    pub name: String,
    pub registration: u64,
    pub last_call_ms: i64,
    pub watch_interval_ms: u64,
    pub endpoint: Option<String>,
}

impl TargetSnapshot {
    /// Whether the debounce interval has elapsed at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        let interval = i64::try_from(self.watch_interval_ms).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_call_ms) >= interval
    }
}
