//! Watch registry: the set of watched targets and their per-checkpoint hooks.

pub mod registry;
pub mod types;

pub use registry::{HookGuard, WatchGuard, WatchRegistry, MIN_SAFE_INTERVAL_MS};
pub use types::{HookKind, TargetSnapshot};
