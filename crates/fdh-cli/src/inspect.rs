// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `fdh inspect`

use std::io::Write;

use clap::Args;
use fdh_core::{FileType, Handle, HandleConfig, OFlag};
use serde::Serialize;
use tracing::debug;

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Output in JSON format
    #[arg(long, help = "Output in JSON format")]
    pub json: bool,
}

/// What `inspect` learns about one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InspectReport {
    pub path: String,
    pub file_type: FileType,
    pub size: u64,
    pub dev: u64,
    pub ino: u64,
    pub permissions: String,
    pub nlink: u64,
    pub mount_point: bool,
    pub symlink: bool,
}

/// Open `path` read-only and collect its report. `O_NONBLOCK` keeps FIFOs
/// without a writer from blocking the open.
pub fn inspect_path(path: &str, config: &HandleConfig) -> fdh_core::Result<InspectReport> {
    let mut handle = Handle::open_with(
        path,
        OFlag::O_RDONLY | OFlag::O_NONBLOCK,
        config.permissions(),
        config,
    )?;
    let meta = handle.stat(false)?;
    let mount_point = handle.is_mount_point()?;

    Ok(InspectReport {
        path: handle.path().to_string(),
        file_type: meta.file_type,
        size: meta.size,
        dev: meta.dev,
        ino: meta.ino,
        permissions: format!("{:04o}", meta.mode),
        nlink: meta.nlink,
        mount_point,
        symlink: handle.is_symlink(),
    })
}

impl InspectArgs {
    pub fn run(&self, config: &HandleConfig, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut reports = Vec::with_capacity(self.paths.len());
        let mut failed = 0usize;

        for path in &self.paths {
            match inspect_path(path, config) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    debug!(path = %path, error = %err, "Inspect failed");
                    eprintln!("fdh: {path}: {err}");
                    failed += 1;
                }
            }
        }

        if self.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&reports)?)?;
        } else {
            for report in &reports {
                write_plain(out, report)?;
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} of {} paths could not be inspected", self.paths.len());
        }
        Ok(())
    }
}

fn write_plain(out: &mut dyn Write, report: &InspectReport) -> std::io::Result<()> {
    writeln!(
        out,
        "path={} type={} size={} dev={} ino={} permissions={} nlink={} mount-point={} symlink={}",
        report.path,
        report.file_type.as_str(),
        report.size,
        report.dev,
        report.ino,
        report.permissions,
        report.nlink,
        report.mount_point,
        report.symlink,
    )
}
