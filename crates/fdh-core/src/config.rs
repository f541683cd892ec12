// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Handle configuration types
//!
//! Keys live under the `[handle]` table of a TOML document:
//!
//! ```toml
//! [handle]
//! eager-stat = true
//! retry-interrupted = false
//! default-permissions = 0o644
//! ```
//!
//! Environment overrides use the `FDH_HANDLE_` prefix:
//!
//! - `FDH_HANDLE_EAGER_STAT` → `handle.eager-stat`
//! - `FDH_HANDLE_RETRY_INTERRUPTED` → `handle.retry-interrupted`
//! - `FDH_HANDLE_DEFAULT_PERMISSIONS` → `handle.default-permissions` (octal)

use std::path::Path;

use nix::sys::stat::Mode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Permissions used when `open` creates a file and the caller gave none.
pub const DEFAULT_PERMISSIONS: u32 = 0o777;

/// Policy applied to handles opened through [`crate::Handle::open_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HandleConfig {
    /// Populate the metadata snapshot as part of `open`.
    pub eager_stat: bool,
    /// Restart read, write and seek when the kernel reports `EINTR`.
    pub retry_interrupted: bool,
    /// Creation permissions for `open`.
    pub default_permissions: u32,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            eager_stat: false,
            retry_interrupted: false,
            default_permissions: DEFAULT_PERMISSIONS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    handle: HandleConfig,
}

impl HandleConfig {
    /// Parse the `[handle]` table of a TOML document. A missing table yields defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let doc: Document = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        Ok(doc.handle)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `FDH_HANDLE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("FDH_HANDLE_EAGER_STAT") {
            self.eager_stat = parse_bool("FDH_HANDLE_EAGER_STAT", &value)?;
        }
        if let Some(value) = lookup("FDH_HANDLE_RETRY_INTERRUPTED") {
            self.retry_interrupted = parse_bool("FDH_HANDLE_RETRY_INTERRUPTED", &value)?;
        }
        if let Some(value) = lookup("FDH_HANDLE_DEFAULT_PERMISSIONS") {
            let digits = value.trim().trim_start_matches("0o");
            self.default_permissions = u32::from_str_radix(digits, 8).map_err(|_| {
                Error::Config(format!(
                    "FDH_HANDLE_DEFAULT_PERMISSIONS: invalid octal mode '{}'",
                    value
                ))
            })?;
        }
        Ok(self)
    }

    pub fn permissions(&self) -> Mode {
        Mode::from_bits_truncate(self.default_permissions as libc::mode_t)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}: invalid boolean '{}'", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_table_missing() {
        let config = HandleConfig::from_toml_str("").unwrap();
        assert_eq!(config, HandleConfig::default());
        assert_eq!(config.default_permissions, 0o777);
    }

    #[test]
    fn test_parse_handle_table() {
        let config = HandleConfig::from_toml_str(
            r#"
            [handle]
            eager-stat = true
            default-permissions = 0o640
            "#,
        )
        .unwrap();
        assert!(config.eager_stat);
        assert!(!config.retry_interrupted);
        assert_eq!(config.default_permissions, 0o640);
        assert_eq!(config.permissions().bits() as u32, 0o640);
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = HandleConfig::from_toml_str("[handle]\neager-stat = \"sometimes\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("FDH_HANDLE_RETRY_INTERRUPTED", "yes"),
            ("FDH_HANDLE_DEFAULT_PERMISSIONS", "0o600"),
        ]
        .into_iter()
        .collect();

        let config = HandleConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(config.retry_interrupted);
        assert!(!config.eager_stat);
        assert_eq!(config.default_permissions, 0o600);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let err = HandleConfig::default()
            .with_overrides(|key| {
                (key == "FDH_HANDLE_DEFAULT_PERMISSIONS").then(|| "999".to_string())
            })
            .unwrap_err();
        assert!(err.to_string().contains("invalid octal mode"));
    }
}
