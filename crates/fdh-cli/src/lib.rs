// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use fdh_logging::CliLoggingArgs;

pub mod config;
pub mod inspect;
pub mod resolve;

pub use clap::Parser;
pub use config::FdhConfig;

#[derive(clap::Parser, Debug)]
#[command(
    name = "fdh",
    about = "Inspect files through owned descriptor handles",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// TOML file with [handle] and [logging] tables
    #[arg(long, env = "FDH_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub logging: CliLoggingArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open paths and report their metadata
    Inspect(inspect::InspectArgs),
    /// Print the canonical form of paths without touching the filesystem
    Normalize(NormalizeArgs),
    /// Resolve a host name to addresses
    Resolve(resolve::ResolveArgs),
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    #[arg(required = true, allow_hyphen_values = true)]
    pub paths: Vec<String>,
}

impl NormalizeArgs {
    pub fn run(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        for path in &self.paths {
            writeln!(out, "{}", fdh_core::path::normalize(path))?;
        }
        Ok(())
    }
}

impl Cli {
    pub fn run(self, config: &FdhConfig, out: &mut dyn Write) -> anyhow::Result<()> {
        match self.command {
            Commands::Inspect(args) => args.run(&config.handle, out),
            Commands::Normalize(args) => args.run(out),
            Commands::Resolve(args) => args.run(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_with_global_flags() {
        let cli = Cli::try_parse_from([
            "fdh",
            "inspect",
            "--json",
            "/dev/null",
            "/",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.logging.log_level, Some(fdh_logging::CliLogLevel::Debug));
        match cli.command {
            Commands::Inspect(args) => {
                assert!(args.json);
                assert_eq!(args.paths, ["/dev/null", "/"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_inspect_requires_a_path() {
        assert!(Cli::try_parse_from(["fdh", "inspect"]).is_err());
    }

    #[test]
    fn test_resolve_families_conflict() {
        assert!(Cli::try_parse_from(["fdh", "resolve", "localhost", "--ipv4", "--ipv6"]).is_err());
    }

    #[test]
    fn test_normalize_writes_one_line_per_path() {
        let cli = Cli::try_parse_from(["fdh", "normalize", "a//b/", "//a", ".", ""]).unwrap();
        let mut out = Vec::new();
        cli.run(&FdhConfig::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "./a/b\n/a\n.\n\n");
    }
}
