//! Parsers for discovery tool text output.
//!
//! Pure functions over captured lines, one per tool format. Lines that do not
//! match are ignored; none of these fail.

use std::sync::OnceLock;

use lanwatch_core::mac::normalize_mac;
use lanwatch_core::HostRecord;
use regex::Regex;

/// Marker line that opens each host block in nmap's normal output.
pub const NMAP_REPORT_MARKER: &str = "Nmap scan report for ";

fn arp_scan_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\s+([0-9A-Fa-f:]+)\s*(.*)$")
            .expect("valid arp-scan regex")
    })
}

fn nmap_report_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Nmap scan report for (?:(\S+) \()?(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\)?")
            .expect("valid nmap report regex")
    })
}

fn nmap_mac_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"MAC Address:\s*([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})(?:\s*\(([^)]*)\))?")
            .expect("valid nmap MAC regex")
    })
}

fn any_mac() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9A-Fa-f]{1,2}[:-]){5}[0-9A-Fa-f]{1,2}").expect("valid MAC regex")
    })
}

fn open_port_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)/(tcp|udp)\s+open\s+(\S+)\s*(.*)$").expect("valid port regex")
    })
}

fn os_details_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"OS details:\s*(.+)").expect("valid OS regex"))
}

fn os_running_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Running:\s*(.+)").expect("valid OS regex"))
}

fn report_hostname() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Nmap scan report for (\S+)\s*\(").expect("valid hostname regex"))
}

// ── arp-scan ──────────────────────────────────────────────────────

/// Parse one `arp-scan` result line: `<ip> <mac> <vendor free text>`.
pub fn parse_arp_scan_line(line: &str) -> Option<HostRecord> {
    let caps = arp_scan_line().captures(line)?;
    let mac = normalize_mac(&caps[2])?;
    let mut record = HostRecord::new(&caps[1]).with_vendor(&caps[3]);
    record.mac = Some(mac);
    Some(record)
}

pub fn parse_arp_scan<S: AsRef<str>>(lines: &[S]) -> Vec<HostRecord> {
    lines
        .iter()
        .filter_map(|l| parse_arp_scan_line(l.as_ref()))
        .collect()
}

// ── nmap host discovery (-sn) ─────────────────────────────────────

/// Split nmap normal output into one record per `Nmap scan report for` block.
///
/// Hosts without a `MAC Address:` line are still emitted; that is how hosts
/// beyond the local segment show up.
pub fn parse_nmap_ping_scan<S: AsRef<str>>(lines: &[S]) -> Vec<HostRecord> {
    let mut records = Vec::new();
    let mut current: Option<HostRecord> = None;

    for line in lines.iter().map(AsRef::as_ref) {
        let trimmed = line.trim();
        if trimmed.starts_with(NMAP_REPORT_MARKER) {
            records.extend(current.take());
            current = parse_nmap_report_line(trimmed);
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        if record.mac.is_some() {
            continue;
        }
        if let Some(caps) = nmap_mac_line().captures(trimmed) {
            record.mac = normalize_mac(&caps[1]);
            let vendor = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            // nmap prints "(Unknown)" when its own OUI table misses.
            if !vendor.is_empty() && vendor != "Unknown" {
                record.vendor = Some(vendor.to_string());
            }
        }
    }
    records.extend(current);

    records
}

fn parse_nmap_report_line(line: &str) -> Option<HostRecord> {
    let caps = nmap_report_line().captures(line)?;
    let mut record = HostRecord::new(&caps[2]);
    if let Some(name) = caps.get(1) {
        record = record.with_hostname(name.as_str());
    }
    Some(record)
}

// ── neighbor cache ────────────────────────────────────────────────

/// First MAC in `arp -n` output. All-zero entries count as missing.
pub fn parse_neighbor_mac(output: &str) -> Option<String> {
    let raw = any_mac().find(output)?;
    let mac = normalize_mac(raw.as_str())?;
    if mac == "00:00:00:00:00:00" {
        None
    } else {
        Some(mac)
    }
}

// ── deep scan (nmap -A) ───────────────────────────────────────────

/// What an aggressive single-target scan revealed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepScanFindings {
    /// One entry per open port, e.g. `22/tcp (ssh - OpenSSH 9.6)`.
    pub open_ports: Vec<String>,
    pub detected_os: Option<String>,
    pub hostname: Option<String>,
}

impl DeepScanFindings {
    /// Comma-joined port summary, `None` when nothing was open.
    pub fn open_ports_summary(&self) -> Option<String> {
        if self.open_ports.is_empty() {
            None
        } else {
            Some(self.open_ports.join(", "))
        }
    }
}

pub fn parse_deep_scan<S: AsRef<str>>(lines: &[S]) -> DeepScanFindings {
    let mut findings = DeepScanFindings::default();
    let mut running = None;

    for line in lines.iter().map(AsRef::as_ref) {
        if let Some(caps) = open_port_line().captures(line) {
            let extra = caps[4].trim();
            let entry = if extra.is_empty() {
                format!("{}/{} ({})", &caps[1], &caps[2], &caps[3])
            } else {
                format!("{}/{} ({} - {})", &caps[1], &caps[2], &caps[3], extra)
            };
            findings.open_ports.push(entry);
            continue;
        }

        if findings.detected_os.is_none() {
            if let Some(caps) = os_details_line().captures(line) {
                findings.detected_os = Some(caps[1].trim().to_string());
                continue;
            }
        }

        if running.is_none() {
            if let Some(caps) = os_running_line().captures(line) {
                running = Some(caps[1].trim().to_string());
                continue;
            }
        }

        if findings.hostname.is_none() {
            if let Some(caps) = report_hostname().captures(line) {
                findings.hostname = Some(caps[1].to_string());
            }
        }
    }

    if findings.detected_os.is_none() {
        findings.detected_os = running;
    }
    findings
}
