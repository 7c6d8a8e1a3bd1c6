//! Configuration for the lanwatch discovery engine.

use std::time::Duration;

use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from `lanwatch.toml` `[discover]` section or
/// `LANWATCH_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Directory holding the device registry and scan history.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Maximum deep scans running at once.
    #[serde(default = "default_deep_scan_workers")]
    pub deep_scan_workers: usize,

    /// Hard limit for one aggressive single-target probe.
    #[serde(default = "default_deep_scan_timeout")]
    pub deep_scan_timeout_secs: u64,

    /// Per-host reachability timeout in the IP-sweep fallback.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,

    /// Hosts probed concurrently by the IP-sweep fallback.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,

    /// Queue a deep scan for every newly discovered device.
    #[serde(default = "default_true")]
    pub auto_deep_scan: bool,

    /// Prefix tool invocations with `sudo` when not running as root.
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Periodic scan settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scan interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

/// Discovery mechanisms, in fallback order.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryTool {
    /// ARP sweep via `arp-scan`.
    #[default]
    ArpScan,
    /// Host discovery via `nmap -sn`.
    Nmap,
    /// Reachability sweep plus neighbor-cache lookup.
    Ping,
}

impl DiscoveryTool {
    /// Parse a `network.scanner-tool` setting. Unknown values mean the default.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "nmap" => Self::Nmap,
            "ping" => Self::Ping,
            _ => Self::ArpScan,
        }
    }

    /// Name recorded on the scan run and the binary probed on `PATH`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArpScan => "arp-scan",
            Self::Nmap => "nmap",
            Self::Ping => "ping",
        }
    }
}

/// Whether external tools need a `sudo` prefix. Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Already uid 0.
    Root,
    /// Not root; wrap privileged commands in `sudo`.
    Sudo,
    /// Not root and `sudo` disabled; run commands as-is.
    Unprivileged,
}

impl Privilege {
    /// Detect the effective uid via `id -u`.
    pub async fn detect(use_sudo: bool) -> Self {
        let is_root = tokio::process::Command::new("id")
            .arg("-u")
            .output()
            .await
            .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
            .unwrap_or(false);

        let privilege = match (is_root, use_sudo) {
            (true, _) => Self::Root,
            (false, true) => Self::Sudo,
            (false, false) => Self::Unprivileged,
        };
        tracing::info!(privilege = ?privilege, "Resolved tool privilege");
        privilege
    }
}

impl DiscoverConfig {
    pub fn deep_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.deep_scan_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

fn default_data_dir() -> String {
    "./lanwatch-data".to_string()
}

fn default_deep_scan_workers() -> usize {
    4
}

fn default_deep_scan_timeout() -> u64 {
    300
}

fn default_ping_timeout() -> u64 {
    500
}

fn default_sweep_concurrency() -> usize {
    32
}

fn default_interval() -> u64 {
    86_400
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
        }
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            deep_scan_workers: default_deep_scan_workers(),
            deep_scan_timeout_secs: default_deep_scan_timeout(),
            ping_timeout_ms: default_ping_timeout(),
            sweep_concurrency: default_sweep_concurrency(),
            auto_deep_scan: true,
            use_sudo: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}
