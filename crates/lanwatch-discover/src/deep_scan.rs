//! Aggressive single-target probes (`nmap -A`) and the bounded pool that
//! runs them in the background.
//!
//! A probe never fails once it has an IP to aim at: process errors and
//! timeouts end up in the device's deep-scan log, and `last_deep_scan` is
//! always stamped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use lanwatch_core::events::{EventPayload, WatchEvent};
use lanwatch_core::{Device, DeviceId};
use lanwatch_registry::DeviceRegistry;
use tokio::sync::{broadcast, Semaphore};

use crate::config::Privilege;
use crate::error::{DiscoverError, Result};
use crate::parse::{self, DeepScanFindings};
use crate::process::{CommandSpec, ProcessRunner};
use crate::transcript::Transcript;

/// Runs one deep probe against one device.
pub struct DeepScanner {
    runner: Arc<dyn ProcessRunner>,
    privilege: Privilege,
    timeout: Duration,
}

impl DeepScanner {
    pub fn new(runner: Arc<dyn ProcessRunner>, privilege: Privilege, timeout: Duration) -> Self {
        Self {
            runner,
            privilege,
            timeout,
        }
    }

    /// Probe `device` in place. Errors only when it has no IP.
    pub async fn probe(&self, device: &mut Device) -> Result<()> {
        let ip = device
            .ip_address
            .clone()
            .filter(|ip| !ip.trim().is_empty())
            .ok_or_else(|| DiscoverError::NoIpAddress(device.mac_address.clone()))?;

        tracing::info!(mac = %device.mac_address, ip = %ip, "Starting deep scan");

        let mut log = Transcript::new();
        log.field("Deep Scan started at", Utc::now().to_rfc3339());
        log.field("Target IP", &ip);
        log.separator();

        let command = CommandSpec::privileged(self.privilege, "nmap", ["-A", "-T4", ip.as_str()]);
        log.command(&command.display());
        log.line("");

        match self.runner.run(&command, self.timeout).await {
            Ok(output) => {
                log.lines(&output.lines);
                if output.timed_out {
                    log.line("");
                    log.warn(&format!(
                        "Scan timed out after {} seconds",
                        self.timeout.as_secs()
                    ));
                }
                let findings = parse::parse_deep_scan(&output.lines);
                apply_findings(device, &findings);
                tracing::info!(
                    mac = %device.mac_address,
                    ip = %ip,
                    open_ports = findings.open_ports.len(),
                    os = ?findings.detected_os,
                    timed_out = output.timed_out,
                    "Deep scan complete"
                );
            }
            Err(e) => {
                tracing::error!(mac = %device.mac_address, ip = %ip, error = %e, "Deep scan failed");
                log.line("");
                log.error(&e.to_string());
            }
        }

        device.deep_scan_log = Some(log.into_string());
        device.last_deep_scan = Some(Utc::now());
        Ok(())
    }
}

/// Copy parsed findings onto a device. Hostname is only filled in, never replaced.
pub fn apply_findings(device: &mut Device, findings: &DeepScanFindings) {
    device.open_ports = findings.open_ports_summary();
    if findings.detected_os.is_some() {
        device.detected_os = findings.detected_os.clone();
    }
    let has_hostname = device.hostname.as_deref().is_some_and(|h| !h.is_empty());
    if !has_hostname {
        if let Some(hostname) = &findings.hostname {
            device.hostname = Some(hostname.clone());
        }
    }
}

/// Fire-and-forget deep-scan submission.
pub trait DeepScanQueue: Send + Sync {
    /// Must not block the caller.
    fn submit(&self, device_id: DeviceId);
}

/// Background deep-scan runner capped at a fixed number of concurrent probes.
///
/// Submissions past the cap wait on the semaphore inside their own task; a
/// device already queued or running is not queued twice.
#[derive(Clone)]
pub struct DeepScanPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    scanner: DeepScanner,
    registry: Arc<dyn DeviceRegistry>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<DeviceId>>,
    events: broadcast::Sender<WatchEvent>,
}

impl DeepScanPool {
    pub fn new(
        scanner: DeepScanner,
        registry: Arc<dyn DeviceRegistry>,
        workers: usize,
        events: broadcast::Sender<WatchEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                scanner,
                registry,
                permits: Arc::new(Semaphore::new(workers.max(1))),
                in_flight: Mutex::new(HashSet::new()),
                events,
            }),
        }
    }

    /// Probe a device and wait for the result, still within the worker cap.
    ///
    /// Rejected while the same device is already queued or being probed.
    pub async fn run_now(&self, device_id: DeviceId) -> Result<Device> {
        let _claim = InFlight::claim(&self.inner, device_id)
            .ok_or_else(|| DiscoverError::DeepScanInProgress(device_id.to_string()))?;
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|e| DiscoverError::Config(format!("deep-scan pool closed: {e}")))?;
        self.inner.scan_and_save(device_id).await
    }

    /// Number of devices queued or being probed.
    pub fn pending(&self) -> usize {
        self.inner.in_flight_set().len()
    }
}

impl PoolInner {
    fn in_flight_set(&self) -> std::sync::MutexGuard<'_, HashSet<DeviceId>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn scan_and_save(&self, device_id: DeviceId) -> Result<Device> {
        let mut probed = self
            .registry
            .find_by_id(device_id)?
            .ok_or_else(|| DiscoverError::DeviceNotFound(device_id.to_string()))?;
        self.scanner.probe(&mut probed).await?;

        // A scan may have touched the row while nmap ran; only write our fields.
        let mut device = self.registry.find_by_id(device_id)?.unwrap_or_else(|| probed.clone());
        device.open_ports = probed.open_ports;
        device.detected_os = probed.detected_os;
        if device.hostname.as_deref().map_or(true, str::is_empty) {
            device.hostname = probed.hostname;
        }
        device.deep_scan_log = probed.deep_scan_log;
        device.last_deep_scan = probed.last_deep_scan;
        let device = self.registry.save(device)?;

        let _ = self.events.send(WatchEvent::new(EventPayload::DeepScanFinished {
            mac: device.mac_address.clone(),
            open_ports: device.open_ports.clone(),
            detected_os: device.detected_os.clone(),
        }));
        Ok(device)
    }
}

impl DeepScanQueue for DeepScanPool {
    fn submit(&self, device_id: DeviceId) {
        let Some(claim) = InFlight::claim(&self.inner, device_id) else {
            tracing::debug!(device_id = %device_id, "Deep scan already queued");
            return;
        };
        tracing::info!(device_id = %device_id, "Scheduling deep scan");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _claim = claim;
            let result = match Arc::clone(&inner.permits).acquire_owned().await {
                Ok(_permit) => inner.scan_and_save(device_id).await,
                Err(e) => Err(DiscoverError::Config(format!("deep-scan pool closed: {e}"))),
            };
            if let Err(e) = result {
                tracing::error!(device_id = %device_id, error = %e, "Deep scan not recorded");
            }
        });
    }
}

/// Marks a device as queued or being probed. Dropping it, on any path
/// including a panicking task, frees the device for the next request.
struct InFlight {
    inner: Arc<PoolInner>,
    device_id: DeviceId,
}

impl InFlight {
    fn claim(inner: &Arc<PoolInner>, device_id: DeviceId) -> Option<Self> {
        inner.in_flight_set().insert(device_id).then(|| Self {
            inner: Arc::clone(inner),
            device_id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.in_flight_set().remove(&self.device_id);
    }
}
