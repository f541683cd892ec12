// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Root configuration of the `fdh` binary

use std::path::Path;

use anyhow::Context;
use fdh_core::HandleConfig;
use fdh_logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Whole config file: `[handle]` and `[logging]`, both optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FdhConfig {
    pub handle: HandleConfig,
    pub logging: LoggingConfig,
}

impl FdhConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read `path` when given, then apply `FDH_HANDLE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.handle = config.handle.with_env_overrides()?;
        Ok(config)
    }
}
