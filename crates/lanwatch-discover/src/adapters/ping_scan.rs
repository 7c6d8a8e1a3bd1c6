//! Host discovery via `nmap -sn`.
//!
//! No port probing. nmap resolves PTR names itself, so hostnames come
//! straight from the report lines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use lanwatch_core::HostRecord;

use super::{note_timeout, DiscoveryAdapter};
use crate::config::{DiscoveryTool, Privilege};
use crate::error::Result;
use crate::parse;
use crate::process::{CommandSpec, ProcessRunner};
use crate::transcript::Transcript;

pub struct PingScanAdapter {
    runner: Arc<dyn ProcessRunner>,
    privilege: Privilege,
}

impl PingScanAdapter {
    pub fn new(runner: Arc<dyn ProcessRunner>, privilege: Privilege) -> Self {
        Self { runner, privilege }
    }
}

#[async_trait]
impl DiscoveryAdapter for PingScanAdapter {
    fn tool(&self) -> DiscoveryTool {
        DiscoveryTool::Nmap
    }

    async fn discover(
        &self,
        range: &Ipv4Net,
        timeout: Duration,
        transcript: &mut Transcript,
    ) -> Result<Vec<HostRecord>> {
        // Root lets nmap use ARP on the local segment, which is what yields MACs.
        let command = CommandSpec::privileged(self.privilege, "nmap", ["-sn".to_string(), range.to_string()]);
        transcript.command(&command.display());
        transcript.field("Network range", range);
        transcript.separator();

        let output = self.runner.run(&command, timeout).await?;
        transcript.lines(&output.lines);
        if output.timed_out {
            note_timeout(transcript, "nmap", timeout);
        }

        let records = parse::parse_nmap_ping_scan(&output.lines);
        tracing::info!(
            range = %range,
            hosts = records.len(),
            without_mac = records.iter().filter(|r| r.mac.is_none()).count(),
            "nmap ping-scan finished"
        );
        Ok(records)
    }
}
