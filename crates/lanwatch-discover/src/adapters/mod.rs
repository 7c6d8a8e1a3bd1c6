//! Discovery adapters and the tool fallback chain.
//!
//! Each adapter runs one mechanism over a CIDR range and returns the hosts it
//! saw. [`ToolChain`] decides which adapter a scan uses based on the
//! configured preference and what is installed.

pub mod arp_sweep;
pub mod ip_sweep;
pub mod ping_scan;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use lanwatch_core::HostRecord;

use crate::config::DiscoveryTool;
use crate::error::{DiscoverError, Result};
use crate::probe::ToolProbe;
use crate::transcript::Transcript;

pub use arp_sweep::ArpSweepAdapter;
pub use ip_sweep::IpSweepAdapter;
pub use ping_scan::PingScanAdapter;

/// One discovery mechanism.
#[async_trait]
pub trait DiscoveryAdapter: Send + Sync {
    /// Tool name recorded on the scan run.
    fn tool(&self) -> DiscoveryTool;

    /// Discover hosts in `range`, appending commands and raw output to
    /// `transcript`. `timeout` bounds the whole call.
    ///
    /// Errors only when no process could be started at all.
    async fn discover(
        &self,
        range: &Ipv4Net,
        timeout: Duration,
        transcript: &mut Transcript,
    ) -> Result<Vec<HostRecord>>;
}

/// Picks the adapter for one scan.
#[async_trait]
pub trait AdapterSelector: Send + Sync {
    async fn select(&self, preference: DiscoveryTool) -> Arc<dyn DiscoveryAdapter>;
}

/// Fallback order, first match wins:
///
/// 1. arp-scan, if preferred and installed
/// 2. nmap, if installed
/// 3. plain IP sweep
///
/// A `ping` preference still takes nmap when it is available.
pub async fn choose_tool(preference: DiscoveryTool, probe: &dyn ToolProbe) -> DiscoveryTool {
    if preference == DiscoveryTool::ArpScan && probe.available(DiscoveryTool::ArpScan.as_str()).await {
        return DiscoveryTool::ArpScan;
    }
    if probe.available(DiscoveryTool::Nmap.as_str()).await {
        return DiscoveryTool::Nmap;
    }
    DiscoveryTool::Ping
}

/// The production selector: probes `PATH` and hands out one of three adapters.
pub struct ToolChain {
    probe: Arc<dyn ToolProbe>,
    arp: Arc<dyn DiscoveryAdapter>,
    nmap: Arc<dyn DiscoveryAdapter>,
    sweep: Arc<dyn DiscoveryAdapter>,
}

impl ToolChain {
    pub fn new(
        probe: Arc<dyn ToolProbe>,
        arp: Arc<dyn DiscoveryAdapter>,
        nmap: Arc<dyn DiscoveryAdapter>,
        sweep: Arc<dyn DiscoveryAdapter>,
    ) -> Self {
        Self {
            probe,
            arp,
            nmap,
            sweep,
        }
    }
}

#[async_trait]
impl AdapterSelector for ToolChain {
    async fn select(&self, preference: DiscoveryTool) -> Arc<dyn DiscoveryAdapter> {
        let chosen = choose_tool(preference, self.probe.as_ref()).await;
        if chosen != preference {
            tracing::info!(
                preferred = preference.as_str(),
                chosen = chosen.as_str(),
                "Preferred discovery tool unavailable, falling back"
            );
        }
        match chosen {
            DiscoveryTool::ArpScan => Arc::clone(&self.arp),
            DiscoveryTool::Nmap => Arc::clone(&self.nmap),
            DiscoveryTool::Ping => Arc::clone(&self.sweep),
        }
    }
}

/// Parse an IPv4 CIDR range such as `192.168.1.0/24`.
pub fn parse_range(range: &str) -> Result<Ipv4Net> {
    range
        .trim()
        .parse::<Ipv4Net>()
        .map_err(|e| DiscoverError::InvalidRange {
            range: range.to_string(),
            reason: e.to_string(),
        })
}

/// Log a tool timeout into the transcript. Partial output is still parsed.
pub(crate) fn note_timeout(transcript: &mut Transcript, tool: &str, timeout: Duration) {
    tracing::warn!(tool, timeout_secs = timeout.as_secs(), "Discovery tool timed out");
    transcript.warn(&format!(
        "{tool} timed out after {} seconds, using partial output",
        timeout.as_secs()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Installed(HashSet<&'static str>);

    #[async_trait]
    impl ToolProbe for Installed {
        async fn available(&self, tool: &str) -> bool {
            self.0.contains(tool)
        }
    }

    fn installed(tools: &[&'static str]) -> Installed {
        Installed(tools.iter().copied().collect())
    }

    #[tokio::test]
    async fn test_preferred_arp_scan_when_installed() {
        let probe = installed(&["arp-scan", "nmap"]);
        assert_eq!(choose_tool(DiscoveryTool::ArpScan, &probe).await, DiscoveryTool::ArpScan);
    }

    #[tokio::test]
    async fn test_falls_back_to_nmap() {
        let probe = installed(&["nmap"]);
        assert_eq!(choose_tool(DiscoveryTool::ArpScan, &probe).await, DiscoveryTool::Nmap);
        // Not preferred, so arp-scan is skipped even when present.
        let probe = installed(&["arp-scan", "nmap"]);
        assert_eq!(choose_tool(DiscoveryTool::Nmap, &probe).await, DiscoveryTool::Nmap);
        assert_eq!(choose_tool(DiscoveryTool::Ping, &probe).await, DiscoveryTool::Nmap);
    }

    #[tokio::test]
    async fn test_falls_back_to_sweep() {
        let probe = installed(&[]);
        assert_eq!(choose_tool(DiscoveryTool::ArpScan, &probe).await, DiscoveryTool::Ping);
        let probe = installed(&["arp-scan"]);
        assert_eq!(choose_tool(DiscoveryTool::Nmap, &probe).await, DiscoveryTool::Ping);
    }

    #[test]
    fn test_parse_range() {
        let net = parse_range(" 192.168.1.0/24 ").unwrap();
        assert_eq!(net.hosts().count(), 254);
        assert!(matches!(
            parse_range("192.168.1.0"),
            Err(DiscoverError::InvalidRange { .. })
        ));
        assert!(parse_range("not-a-range").is_err());
    }
}
