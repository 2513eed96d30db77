//! Version resolution: endpoint selection, latest-version lookup and semver comparison.

pub mod source;

pub use source::{FetchResponse, HttpVersionSource, VersionSource};

use semver::{BuildMetadata, Version};
use tracing::{debug, warn};

use crate::error::{AutoupdateError, Result};

/// Registry used when neither the target nor the host configures one.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Pick the registry for a target: its own override, then the host-wide
/// fallback, then [`DEFAULT_REGISTRY`].
pub fn effective_endpoint(target_override: Option<&str>, fallback: Option<&str>) -> String {
    target_override
        .filter(|e| !e.trim().is_empty())
        .or(fallback.filter(|e| !e.trim().is_empty()))
        .unwrap_or(DEFAULT_REGISTRY)
        .to_string()
}

/// `{endpoint}/{name}/latest`
pub fn latest_url(endpoint: &str, name: &str) -> String {
    format!("{}/{}/latest", endpoint.trim_end_matches('/'), name)
}

/// Pull the `version` field out of a registry response.
pub fn extract_version(response: &FetchResponse) -> Result<String> {
    if !response.is_ok() {
        return Err(AutoupdateError::Fetch(format!(
            "status {}: {}",
            response.status_code,
            response.error_message.as_deref().unwrap_or("unknown error")
        )));
    }
    let body = response
        .body
        .as_ref()
        .ok_or_else(|| AutoupdateError::Fetch("empty response body".to_string()))?;
    body.get("version")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AutoupdateError::Fetch("response has no version field".to_string()))
}

/// Fetch the newest published version of `name` from `endpoint`.
///
/// Returns `None` (after logging a warning) when the source is unreachable or
/// the response carries no usable version.
pub async fn resolve_latest(source: &dyn VersionSource, name: &str, endpoint: &str) -> Option<String> {
    let url = latest_url(endpoint, name);
    let response = source.fetch(&url).await;
    match extract_version(&response) {
        Ok(version) => {
            debug!(package = %name, %version, "Resolved latest version");
            Some(version)
        }
        Err(e) => {
            warn!(package = %name, url = %url, "Failed to get latest version: {}", e);
            None
        }
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', '=']);
    let mut version = Version::parse(trimmed).ok()?;
    // Build metadata has no precedence.
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

/// Whether `latest` is strictly newer than `current` under semver precedence.
///
/// False if either side is missing, empty or not a valid version.
pub fn is_update_available(latest: Option<&str>, current: Option<&str>) -> bool {
    let (Some(latest), Some(current)) = (latest, current) else {
        return false;
    };
    match (parse_version(latest), parse_version(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => false,
    }
}
