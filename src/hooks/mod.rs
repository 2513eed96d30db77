//! Hook system for the update pipeline.
//!
//! Hooks fire at two checkpoints for each target:
//!
//! - `update`: a newer version was found, before install (can veto the install)
//! - `reload`: the install succeeded, before reload aggregation (can veto the
//!   target's contribution to the cycle's reload)
//!
//! A hook returning `Ok(true)` vetoes. Errors and panics are logged at debug
//! level and treated as `Ok(false)`; they never reach the scheduler.
//!
//! # Example
//!
//! ```rust
//! use autoupdate::hooks::hook_fn;
//! use autoupdate::watch::{HookKind, WatchRegistry};
//!
//! let registry = WatchRegistry::new();
//! let watch = registry.watch("koishi-plugin-foo", 60_000, false, None).unwrap();
//! watch
//!     .before(
//!         HookKind::Update,
//!         hook_fn(|ctx| async move {
//!             // Hold back pre-releases.
//!             Ok(ctx.latest.as_deref().is_some_and(|v| v.contains('-')))
//!         }),
//!         false,
//!     )
//!     .unwrap()
//!     .detach();
//! watch.detach();
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::debug;

use crate::error::{AutoupdateError, Result};
use crate::watch::{HookKind, WatchRegistry};

// ---------------------------------------------------------------------------
// Hook context
// ---------------------------------------------------------------------------

/// Arguments passed to a hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// Target name.
    pub name: String,
    /// Checkpoint being run.
    pub kind: HookKind,
    /// Newest published version (update checkpoint only).
    pub latest: Option<String>,
    /// Currently installed version (update checkpoint only).
    pub current: Option<String>,
}

impl HookContext {
    pub fn update(name: &str, latest: &str, current: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: HookKind::Update,
            latest: Some(latest.to_string()),
            current: Some(current.to_string()),
        }
    }

    pub fn reload(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: HookKind::Reload,
            latest: None,
            current: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

/// A callback bound to one checkpoint of one target.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Returns `Ok(true)` to veto the checkpoint's default action.
    async fn call(&self, ctx: HookContext) -> Result<bool>;
}

/// Adapter turning an async closure into a [`Hook`].
pub struct FnHook<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    async fn call(&self, ctx: HookContext) -> Result<bool> {
        (self.f)(ctx).await
    }
}

/// Wrap an async closure as a shareable hook.
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn Hook>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(FnHook { f })
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Run the hook registered for `ctx.name` at `ctx.kind`.
///
/// Returns `None` when no hook is registered, otherwise whether it vetoed.
/// The registry lock is released before the hook is awaited.
pub async fn run_hook(registry: &WatchRegistry, ctx: HookContext) -> Option<bool> {
    let hook = registry.hook(&ctx.name, ctx.kind)?;
    let name = ctx.name.clone();
    let kind = ctx.kind;

    let outcome = match AssertUnwindSafe(hook.call(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(AutoupdateError::Hook(format!(
            "hook panicked: {}",
            panic_message(panic.as_ref())
        ))),
    };

    match outcome {
        Ok(veto) => {
            debug!(package = %name, hook = %kind, veto, "Hook completed");
            Some(veto)
        }
        Err(e) => {
            debug!(package = %name, hook = %kind, "Hook failed, treating as no veto: {}", e);
            Some(false)
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
