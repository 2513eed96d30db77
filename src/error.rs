//! Error types for autoupdate
//!
//! This module defines all error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Registration errors (`DuplicateTarget`, `DuplicateHook`, `UnknownTarget`,
//! `UnknownHook`) are returned synchronously to the caller. The remaining
//! variants are produced inside the polling loop, where they are logged and
//! recovered from rather than propagated.

use thiserror::Error;

use crate::watch::HookKind;

/// The primary error type for autoupdate operations.
#[derive(Error, Debug)]
pub enum AutoupdateError {
    /// A watch target with this name already exists and `force` was not set.
    #[error("Target '{0}' is already watched, pass force=true to replace it")]
    DuplicateTarget(String),

    /// A hook of this kind is already registered for the target and `force` was not set.
    #[error("Target '{name}' already has a '{kind}' hook, pass force=true to replace it")]
    DuplicateHook { name: String, kind: HookKind },

    /// The named target is not watched.
    #[error("Target '{0}' is not watched")]
    UnknownTarget(String),

    /// The named target has no hook of this kind.
    #[error("Target '{name}' has no '{kind}' hook")]
    UnknownHook { name: String, kind: HookKind },

    /// The version source was unreachable or returned no usable version.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The installer reported a failure.
    #[error("Install error: {0}")]
    Install(String),

    /// A user-supplied hook failed.
    #[error("Hook error: {0}")]
    Hook(String),

    /// The host reload mechanism failed.
    #[error("Reload error: {0}")]
    Reload(String),

    /// Configuration-related errors (invalid config, unreadable file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AutoupdateError {
    /// Returns `true` for errors raised by the registration API.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            AutoupdateError::DuplicateTarget(_)
                | AutoupdateError::DuplicateHook { .. }
                | AutoupdateError::UnknownTarget(_)
                | AutoupdateError::UnknownHook { .. }
        )
    }
}

/// A specialized `Result` type for autoupdate operations.
pub type Result<T> = std::result::Result<T, AutoupdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoupdateError::Config("bad timeout".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad timeout");
    }

    #[test]
    fn test_duplicate_hook_display() {
        let err = AutoupdateError::DuplicateHook {
            name: "pkg-a".into(),
            kind: HookKind::Reload,
        };
        assert_eq!(
            err.to_string(),
            "Target 'pkg-a' already has a 'reload' hook, pass force=true to replace it"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoupdateError = io_err.into();
        assert!(matches!(err, AutoupdateError::Io(_)));
    }

    #[test]
    fn test_is_registration_error() {
        assert!(AutoupdateError::DuplicateTarget("a".into()).is_registration_error());
        assert!(AutoupdateError::UnknownTarget("a".into()).is_registration_error());
        assert!(AutoupdateError::UnknownHook {
            name: "a".into(),
            kind: HookKind::Update
        }
        .is_registration_error());
        assert!(!AutoupdateError::Fetch("x".into()).is_registration_error());
        assert!(!AutoupdateError::Reload("x".into()).is_registration_error());
    }
}
