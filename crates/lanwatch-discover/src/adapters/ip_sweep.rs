//! Brute-force reachability sweep, the last resort when neither arp-scan
//! nor nmap is installed.
//!
//! A reachable host is only accepted if the neighbor cache yields its MAC.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ipnet::Ipv4Net;
use lanwatch_core::HostRecord;

use super::{note_timeout, DiscoveryAdapter};
use crate::config::DiscoveryTool;
use crate::error::Result;
use crate::probe::HostProbe;
use crate::transcript::Transcript;

pub struct IpSweepAdapter {
    hosts: Arc<dyn HostProbe>,
    ping_timeout: Duration,
    concurrency: usize,
}

impl IpSweepAdapter {
    pub fn new(hosts: Arc<dyn HostProbe>, ping_timeout: Duration, concurrency: usize) -> Self {
        Self {
            hosts,
            ping_timeout,
            concurrency: concurrency.max(1),
        }
    }

    async fn probe_one(&self, ip: Ipv4Addr) -> Option<HostRecord> {
        let addr = IpAddr::V4(ip);
        if !self.hosts.is_reachable(addr, self.ping_timeout).await {
            return None;
        }
        let Some(mac) = self.hosts.neighbor_mac(addr).await else {
            tracing::debug!(ip = %ip, "Reachable host has no neighbor entry, dropping");
            return None;
        };
        let mut record = HostRecord::new(ip.to_string());
        record.mac = Some(mac);
        record.hostname = self.hosts.reverse_dns(addr).await;
        Some(record)
    }
}

#[async_trait]
impl DiscoveryAdapter for IpSweepAdapter {
    fn tool(&self) -> DiscoveryTool {
        DiscoveryTool::Ping
    }

    async fn discover(
        &self,
        range: &Ipv4Net,
        timeout: Duration,
        transcript: &mut Transcript,
    ) -> Result<Vec<HostRecord>> {
        let targets: Vec<Ipv4Addr> = range.hosts().collect();
        transcript.line("Method: Ping sweep");
        transcript.field("Network range", range);
        transcript.field("Total addresses to scan", targets.len());
        transcript.separator();
        tracing::info!(range = %range, addresses = targets.len(), "Starting ping sweep");

        let mut records = Vec::new();
        let sweep = stream::iter(targets)
            .map(|ip| self.probe_one(ip))
            .buffered(self.concurrency);
        tokio::pin!(sweep);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = sweep.next() => match next {
                    Some(Some(record)) => {
                        if let Some(mac) = record.mac.as_deref() {
                            transcript.line(&format!("Found: {} - {}", record.ip, mac));
                        }
                        records.push(record);
                    }
                    Some(None) => {}
                    None => break,
                },
                _ = &mut deadline => {
                    note_timeout(transcript, "ping sweep", timeout);
                    break;
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Hosts `.1` and `.2` answer; only `.1` has a neighbor entry.
    struct FakeLan {
        alive: HashMap<IpAddr, Option<&'static str>>,
    }

    impl FakeLan {
        fn new() -> Self {
            let mut alive = HashMap::new();
            alive.insert("10.0.0.1".parse().unwrap(), Some("00:14:6C:AA:BB:CC"));
            alive.insert("10.0.0.2".parse().unwrap(), None);
            Self { alive }
        }
    }

    #[async_trait]
    impl HostProbe for FakeLan {
        async fn is_reachable(&self, ip: IpAddr, _timeout: Duration) -> bool {
            self.alive.contains_key(&ip)
        }

        async fn neighbor_mac(&self, ip: IpAddr) -> Option<String> {
            self.alive.get(&ip).copied().flatten().map(str::to_string)
        }

        async fn reverse_dns(&self, ip: IpAddr) -> Option<String> {
            (ip.to_string() == "10.0.0.1").then(|| "gateway.lan".to_string())
        }
    }

    #[tokio::test]
    async fn test_sweep_drops_hosts_without_mac() {
        let adapter = IpSweepAdapter::new(Arc::new(FakeLan::new()), Duration::from_millis(10), 8);
        let range: Ipv4Net = "10.0.0.0/29".parse().unwrap();
        let mut transcript = Transcript::new();

        let records = adapter
            .discover(&range, Duration::from_secs(5), &mut transcript)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, "10.0.0.1");
        assert_eq!(records[0].mac.as_deref(), Some("00:14:6C:AA:BB:CC"));
        assert_eq!(records[0].hostname.as_deref(), Some("gateway.lan"));

        let log = transcript.into_string();
        assert!(log.contains("Total addresses to scan: 6"));
        assert!(log.contains("Found: 10.0.0.1 - 00:14:6C:AA:BB:CC"));
        assert!(!log.contains("10.0.0.2 -"));
    }
}
