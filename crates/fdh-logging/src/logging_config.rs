// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{CliLogLevel, LogFormat};

/// `[logging]` section of a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Logging verbosity level
    #[serde(rename = "log-level")]
    pub level: Option<String>,

    #[serde(rename = "log-format")]
    pub format: Option<LogFormat>,

    #[serde(rename = "log-file")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn level(&self) -> anyhow::Result<Option<CliLogLevel>> {
        self.level
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(anyhow::Error::msg)
    }
}
