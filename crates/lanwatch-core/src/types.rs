//! Core domain types for the LAN device registry.
//!
//! A `HostRecord` is what a discovery tool reported for one host in one
//! scan. A `Device` is the persistent identity behind it, keyed logically
//! by MAC address. `ScanRun` and `ScanResult` form the scan history ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WatchError;
use crate::mac;

/// Longest error message kept on a failed scan.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for a scan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable row identifier for a device. Survives MAC promotion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Discovery ─────────────────────────────────────────────────────

/// One host as reported by a discovery tool during a single scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    pub ip: String,
    /// Uppercase colon-separated, if the tool could see it.
    pub mac: Option<String>,
    pub hostname: Option<String>,
    /// Vendor text printed by the tool itself, if any.
    pub vendor: Option<String>,
}

impl HostRecord {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    /// Attach a MAC; malformed values are dropped rather than stored.
    pub fn with_mac(mut self, raw: &str) -> Self {
        self.mac = mac::normalize_mac(raw);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = non_empty(hostname.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = non_empty(vendor.into());
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Devices ───────────────────────────────────────────────────────

/// Device category, assigned once by the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    AccessPoint,
    Camera,
    Computer,
    DoorLock,
    GamingConsole,
    GarageDoor,
    Laptop,
    Miner,
    Nas,
    Printer,
    Router,
    Server,
    SmartHome,
    SmartPlug,
    SmartSwitch,
    SmartTv,
    Smartphone,
    StreamingDevice,
    Switch,
    Tablet,
    TemperatureSensor,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AccessPoint => "Access Point",
            Self::Camera => "Camera",
            Self::Computer => "Computer",
            Self::DoorLock => "Door Lock",
            Self::GamingConsole => "Gaming Console",
            Self::GarageDoor => "Garage Door",
            Self::Laptop => "Laptop",
            Self::Miner => "Miner",
            Self::Nas => "NAS Storage",
            Self::Printer => "Printer",
            Self::Router => "Router",
            Self::Server => "Server",
            Self::SmartHome => "Smart Home Device",
            Self::SmartPlug => "Smart Plug",
            Self::SmartSwitch => "Smart Switch",
            Self::SmartTv => "Smart TV",
            Self::Smartphone => "Smartphone",
            Self::StreamingDevice => "Streaming Device",
            Self::Switch => "Network Switch",
            Self::Tablet => "Tablet",
            Self::TemperatureSensor => "Temperature Sensor",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A physical host tracked across scans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    /// Logical key. Either a real uppercase MAC or an `fe:00:` placeholder.
    pub mac_address: String,
    /// Most recently observed IP. Not unique.
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub device_type: DeviceType,
    pub online: bool,
    pub known: bool,
    pub trusted: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub open_ports: Option<String>,
    pub detected_os: Option<String>,
    pub deep_scan_log: Option<String>,
    pub last_deep_scan: Option<DateTime<Utc>>,
}

impl Device {
    /// A freshly discovered, not-yet-acknowledged device.
    pub fn new(mac_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: DeviceId::new(),
            mac_address: mac_address.into(),
            ip_address: None,
            hostname: None,
            vendor: None,
            device_type: DeviceType::Unknown,
            online: false,
            known: false,
            trusted: false,
            first_seen: now,
            last_seen: now,
            open_ports: None,
            detected_os: None,
            deep_scan_log: None,
            last_deep_scan: None,
        }
    }

    pub fn has_placeholder_mac(&self) -> bool {
        mac::is_placeholder(&self.mac_address)
    }

    /// Hostname if set, else IP, else MAC.
    pub fn display_name(&self) -> &str {
        self.hostname
            .as_deref()
            .or(self.ip_address.as_deref())
            .unwrap_or(&self.mac_address)
    }
}

// ── Scans ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanType {
    Manual,
    Scheduled,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Manual => "MANUAL",
            Self::Scheduled => "SCHEDULED",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        })
    }
}

/// One discovery scan. Created `Running`, finished exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRun {
    pub id: ScanId,
    pub scan_type: ScanType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub network_range: String,
    pub scanner_tool: Option<String>,
    pub devices_found: u32,
    pub new_devices: u32,
    pub scan_log: Option<String>,
    pub error_message: Option<String>,
}

impl ScanRun {
    pub fn start(scan_type: ScanType, network_range: impl Into<String>) -> Self {
        Self {
            id: ScanId::new(),
            scan_type,
            started_at: Utc::now(),
            completed_at: None,
            status: ScanStatus::Running,
            network_range: network_range.into(),
            scanner_tool: None,
            devices_found: 0,
            new_devices: 0,
            scan_log: None,
            error_message: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != ScanStatus::Running
    }

    pub fn complete(
        &mut self,
        devices_found: u32,
        new_devices: u32,
        scan_log: String,
    ) -> Result<(), WatchError> {
        self.ensure_running()?;
        self.status = ScanStatus::Completed;
        self.devices_found = devices_found;
        self.new_devices = new_devices;
        self.scan_log = Some(scan_log);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the scan failed. The message is truncated to
    /// [`MAX_ERROR_MESSAGE_LEN`] characters.
    pub fn fail(&mut self, error: &str, scan_log: Option<String>) -> Result<(), WatchError> {
        self.ensure_running()?;
        self.status = ScanStatus::Failed;
        self.error_message = Some(truncate_error(error));
        if scan_log.is_some() {
            self.scan_log = scan_log;
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), WatchError> {
        if self.is_finished() {
            return Err(WatchError::ScanAlreadyFinished {
                scan_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Clip an error message to [`MAX_ERROR_MESSAGE_LEN`] characters, ending in `...`.
pub fn truncate_error(msg: &str) -> String {
    if msg.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return msg.to_string();
    }
    let head: String = msg.chars().take(MAX_ERROR_MESSAGE_LEN - 3).collect();
    format!("{head}...")
}

/// One reconciled host within one scan. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub scan_id: ScanId,
    pub device_id: DeviceId,
    pub ip_address: String,
    pub mac_address: String,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub new_device: bool,
    pub recorded_at: DateTime<Utc>,
}

/// What reconciliation did with one host record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created { device_id: DeviceId },
    Updated { device_id: DeviceId },
    /// The IP belongs to a different real MAC; nothing was written.
    SkippedConflict {
        ip: String,
        mac: String,
        owner_mac: String,
    },
    /// Same IP or MAC already handled earlier in this scan.
    DuplicateInScan,
}

impl ReconcileOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}
