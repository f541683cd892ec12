// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use fdh_cli::{Cli, FdhConfig, Parser};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = FdhConfig::load(cli.config.as_deref())?;
    cli.logging.clone().merged_with(&config.logging)?.init("fdh-cli")?;
    tracing::debug!(?config, "Loaded configuration");

    let stdout = std::io::stdout();
    cli.run(&config, &mut stdout.lock())
}
