// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `fdh resolve`

use std::io::Write;

use clap::Args;
use fdh_core::AddressFamily;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub host: String,

    /// Only IPv4 addresses
    #[arg(long, conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Only IPv6 addresses
    #[arg(long)]
    pub ipv6: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn family(&self) -> Option<AddressFamily> {
        match (self.ipv4, self.ipv6) {
            (true, _) => Some(AddressFamily::Inet),
            (_, true) => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    pub fn run(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let addresses = fdh_core::resolve(&self.host, self.family())?;
        if self.json {
            let ips: Vec<String> = addresses.iter().map(ToString::to_string).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&ips)?)?;
        } else {
            for address in &addresses {
                writeln!(out, "{address}")?;
            }
        }
        Ok(())
    }
}
