//! ARP sweep via `arp-scan`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use lanwatch_core::HostRecord;

use super::{note_timeout, DiscoveryAdapter};
use crate::config::{DiscoveryTool, Privilege};
use crate::error::Result;
use crate::parse;
use crate::probe::HostProbe;
use crate::process::{CommandSpec, ProcessRunner};
use crate::transcript::Transcript;

pub struct ArpSweepAdapter {
    runner: Arc<dyn ProcessRunner>,
    hosts: Arc<dyn HostProbe>,
    privilege: Privilege,
}

impl ArpSweepAdapter {
    pub fn new(runner: Arc<dyn ProcessRunner>, hosts: Arc<dyn HostProbe>, privilege: Privilege) -> Self {
        Self {
            runner,
            hosts,
            privilege,
        }
    }
}

#[async_trait]
impl DiscoveryAdapter for ArpSweepAdapter {
    fn tool(&self) -> DiscoveryTool {
        DiscoveryTool::ArpScan
    }

    async fn discover(
        &self,
        range: &Ipv4Net,
        timeout: Duration,
        transcript: &mut Transcript,
    ) -> Result<Vec<HostRecord>> {
        let command = CommandSpec::privileged(self.privilege, "arp-scan", [range.to_string()]);
        transcript.command(&command.display());
        transcript.field("Network range", range);
        transcript.separator();

        let output = self.runner.run(&command, timeout).await?;
        transcript.lines(&output.lines);
        if output.timed_out {
            note_timeout(transcript, "arp-scan", timeout);
        }

        let mut records = parse::parse_arp_scan(&output.lines);
        for record in &mut records {
            if let Ok(ip) = record.ip.parse::<IpAddr>() {
                record.hostname = self.hosts.reverse_dns(ip).await;
            }
        }

        tracing::info!(range = %range, hosts = records.len(), "arp-scan finished");
        Ok(records)
    }
}
