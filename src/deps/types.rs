//! Installed-dependency types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutoupdateError, Result};

/// A dependency as reported by the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDep {
    /// Version currently installed.
    pub resolved: String,
}

impl ResolvedDep {
    pub fn new(resolved: impl Into<String>) -> Self {
        Self {
            resolved: resolved.into(),
        }
    }
}

/// Installed dependencies keyed by package name.
pub type DepMap = HashMap<String, ResolvedDep>;

/// Parse the output of `npm ls --json --depth=0`.
///
/// Entries without a `version` (missing or invalid packages) are skipped.
pub fn parse_npm_ls(output: &str) -> Result<DepMap> {
    let root: Value = serde_json::from_str(output)?;
    let Some(deps) = root.get("dependencies") else {
        return Ok(DepMap::new());
    };
    let deps = deps.as_object().ok_or_else(|| {
        AutoupdateError::Install("`dependencies` in npm ls output is not an object".to_string())
    })?;

    Ok(deps
        .iter()
        .filter_map(|(name, info)| {
            info.get("version")
                .and_then(Value::as_str)
                .map(|v| (name.clone(), ResolvedDep::new(v)))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_npm_ls() {
        let output = r#"{
            "name": "host",
            "dependencies": {
                "koishi-plugin-foo": { "version": "1.0.0", "resolved": "https://registry.npmjs.org/koishi-plugin-foo/-/koishi-plugin-foo-1.0.0.tgz" },
                "koishi-plugin-bar": { "version": "2.3.4" },
                "missing-dep": { "required": "^1.0.0", "missing": true }
            }
        }"#;
        let deps = parse_npm_ls(output).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps["koishi-plugin-foo"].resolved, "1.0.0");
        assert_eq!(deps["koishi-plugin-bar"], ResolvedDep::new("2.3.4"));
        assert!(!deps.contains_key("missing-dep"));
    }

    #[test]
    fn test_parse_npm_ls_empty_project() {
        let deps = parse_npm_ls(r#"{"name": "host", "version": "1.0.0"}"#).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_parse_npm_ls_invalid() {
        assert!(matches!(parse_npm_ls("not json"), Err(AutoupdateError::Json(_))));
        assert!(matches!(
            parse_npm_ls(r#"{"dependencies": []}"#),
            Err(AutoupdateError::Install(_))
        ));
    }

    #[test]
    fn test_resolved_dep_serde() {
        let dep: ResolvedDep = serde_json::from_str(r#"{"resolved":"0.9.1"}"#).unwrap();
        assert_eq!(dep.resolved, "0.9.1");
    }
}
