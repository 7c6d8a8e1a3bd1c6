//! Host-level probes: tool availability, reachability, neighbor cache, and
//! reverse DNS.
//!
//! Everything here answers "no data" rather than failing. A missing tool,
//! an unreachable host, or a DNS miss never aborts a scan.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::Privilege;
use crate::parse;
use crate::process::{CommandSpec, ProcessRunner};

const WHICH_TIMEOUT: Duration = Duration::from_secs(5);
const ARP_TIMEOUT: Duration = Duration::from_secs(5);
const DNS_TIMEOUT: Duration = Duration::from_secs(3);

/// Ports tried when ICMP is unavailable. A refused connection still proves
/// the host is up.
const TCP_FALLBACK_PORTS: &[u16] = &[7, 22, 80, 443];

/// Checks whether a named binary is callable.
#[async_trait]
pub trait ToolProbe: Send + Sync {
    async fn available(&self, tool: &str) -> bool;
}

/// Looks the tool up on `PATH` with `which`.
pub struct PathProbe {
    runner: Arc<dyn ProcessRunner>,
}

impl PathProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ToolProbe for PathProbe {
    async fn available(&self, tool: &str) -> bool {
        let found = self
            .runner
            .run(&CommandSpec::new("which", [tool]), WHICH_TIMEOUT)
            .await
            .map(|out| out.success())
            .unwrap_or(false);
        tracing::debug!(tool, found, "Tool availability probe");
        found
    }
}

/// Per-host primitives used by the discovery adapters.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn is_reachable(&self, ip: IpAddr, timeout: Duration) -> bool;

    /// MAC from the local neighbor/ARP cache, normalized.
    async fn neighbor_mac(&self, ip: IpAddr) -> Option<String>;

    /// PTR name, or `None` when the lookup fails or just echoes the IP.
    async fn reverse_dns(&self, ip: IpAddr) -> Option<String>;
}

/// Probes the real network via `ping`, `arp`, and the system resolver.
pub struct SystemHostProbe {
    runner: Arc<dyn ProcessRunner>,
    privilege: Privilege,
}

impl SystemHostProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>, privilege: Privilege) -> Self {
        Self { runner, privilege }
    }

    async fn tcp_alive(ip: IpAddr, timeout: Duration) -> bool {
        for &port in TCP_FALLBACK_PORTS {
            let attempt = tokio::time::timeout(timeout, TcpStream::connect(SocketAddr::new(ip, port)));
            match attempt.await {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => return true,
                _ => {}
            }
        }
        false
    }
}

#[async_trait]
impl HostProbe for SystemHostProbe {
    async fn is_reachable(&self, ip: IpAddr, timeout: Duration) -> bool {
        // ping's -W takes whole seconds; the runner enforces the real limit.
        let wait_secs = timeout.as_secs().max(1).to_string();
        let target = ip.to_string();
        let ping = CommandSpec::new("ping", ["-c", "1", "-W", wait_secs.as_str(), target.as_str()]);

        match self.runner.run(&ping, timeout + Duration::from_millis(250)).await {
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(error = %e, "ping unavailable, falling back to TCP probe");
                Self::tcp_alive(ip, timeout).await
            }
        }
    }

    async fn neighbor_mac(&self, ip: IpAddr) -> Option<String> {
        let arp = CommandSpec::privileged(self.privilege, "arp", ["-n".to_string(), ip.to_string()]);
        let out = self.runner.run(&arp, ARP_TIMEOUT).await.ok()?;
        parse::parse_neighbor_mac(&out.lines.join("\n"))
    }

    async fn reverse_dns(&self, ip: IpAddr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip).ok());
        let name = tokio::time::timeout(DNS_TIMEOUT, lookup).await.ok()?.ok()??;
        real_hostname(&name, ip)
    }
}

/// Treat a resolver answer equal to the IP itself as "no hostname".
pub fn real_hostname(name: &str, ip: IpAddr) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == ip.to_string() {
        None
    } else {
        Some(name.to_string())
    }
}
