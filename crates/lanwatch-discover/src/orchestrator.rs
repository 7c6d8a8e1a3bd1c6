//! Scan lifecycle: single-flight admission, discovery, reconciliation, and
//! the terminal COMPLETED/FAILED transition.
//!
//! `start_scan` either rejects immediately or returns a handle while the scan
//! runs on its own task. Everything after that is observable through the
//! ledger, the registry, and the event channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lanwatch_core::events::{EventPayload, WatchEvent};
use lanwatch_core::mac::normalize_mac;
use lanwatch_core::{Device, DeviceId, ReconcileOutcome, ScanId, ScanResult, ScanRun, ScanType};
use lanwatch_registry::settings::{SCANNER_TOOL, SCAN_RANGE, SCAN_TIMEOUT};
use lanwatch_registry::Settings;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::adapters::{parse_range, AdapterSelector};
use crate::config::DiscoveryTool;
use crate::deep_scan::DeepScanQueue;
use crate::error::{DiscoverError, Result};
use crate::flight::{FlightPermit, ScanFlight};
use crate::reconcile::{Collaborators, ReconcileSummary, Reconciler};
use crate::transcript::Transcript;

pub const DEFAULT_SCAN_RANGE: &str = "192.168.1.0/24";
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 120;

/// Event channel capacity. Slow subscribers lag rather than block scans.
pub const EVENT_CAPACITY: usize = 256;

/// A running scan. Dropping the handle does not cancel the scan.
pub struct ScanHandle {
    pub scan_id: ScanId,
    join: JoinHandle<ScanRun>,
}

impl ScanHandle {
    /// Wait for the terminal state.
    pub async fn wait(self) -> Result<ScanRun> {
        self.join
            .await
            .map_err(|e| DiscoverError::Task(e.to_string()))
    }
}

/// Owns the single-flight guard and drives scans end to end.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    deps: Collaborators,
    settings: Arc<dyn Settings>,
    selector: Arc<dyn AdapterSelector>,
    deep_scans: Arc<dyn DeepScanQueue>,
    events: broadcast::Sender<WatchEvent>,
    flight: Arc<ScanFlight>,
    auto_deep_scan: bool,
}

impl ScanOrchestrator {
    pub fn new(
        deps: Collaborators,
        settings: Arc<dyn Settings>,
        selector: Arc<dyn AdapterSelector>,
        deep_scans: Arc<dyn DeepScanQueue>,
        events: broadcast::Sender<WatchEvent>,
        auto_deep_scan: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                settings,
                selector,
                deep_scans,
                events,
                flight: Arc::new(ScanFlight::new()),
                auto_deep_scan,
            }),
        }
    }

    /// Start a scan in the background.
    ///
    /// Fails with [`DiscoverError::ScanInProgress`], without touching any
    /// state, if another scan is running.
    pub fn start_scan(&self, scan_type: ScanType) -> Result<ScanHandle> {
        let permit = self
            .inner
            .flight
            .try_start()
            .ok_or(DiscoverError::ScanInProgress)?;

        let range = self.inner.settings.get(SCAN_RANGE, DEFAULT_SCAN_RANGE);
        let run = ScanRun::start(scan_type, range.trim());
        self.inner.deps.ledger.save_run(&run)?;
        let scan_id = run.id;

        tracing::info!(scan_id = %scan_id, scan_type = ?scan_type, range = %run.network_range, "Scan started");
        self.inner.emit(EventPayload::ScanStarted {
            scan_id,
            scan_type,
            network_range: run.network_range.clone(),
        });

        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move { inner.execute(run, permit).await });
        Ok(ScanHandle { scan_id, join })
    }

    pub fn is_scan_in_progress(&self) -> bool {
        self.inner.flight.is_running()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.events.subscribe()
    }

    // ── History ───────────────────────────────────────────────

    /// Newest first.
    pub fn recent_scans(&self, limit: usize) -> Result<Vec<ScanRun>> {
        let mut runs = self.inner.deps.ledger.list_runs()?;
        runs.truncate(limit);
        Ok(runs)
    }

    pub fn scan_by_id(&self, scan_id: ScanId) -> Result<Option<ScanRun>> {
        Ok(self.inner.deps.ledger.find_run(scan_id)?)
    }

    pub fn latest_scan(&self) -> Result<Option<ScanRun>> {
        Ok(self.inner.deps.ledger.most_recent()?)
    }

    pub fn results_for_scan(&self, scan_id: ScanId) -> Result<Vec<ScanResult>> {
        Ok(self.inner.deps.ledger.results_for(scan_id)?)
    }

    pub fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.inner.deps.registry.all()?)
    }

    /// Look a device up by MAC, accepting any common MAC spelling.
    pub fn find_device(&self, mac: &str) -> Result<Device> {
        let key = normalize_mac(mac).unwrap_or_else(|| mac.trim().to_lowercase());
        self.inner
            .deps
            .registry
            .find_by_mac(&key)?
            .ok_or_else(|| DiscoverError::DeviceNotFound(mac.to_string()))
    }

    /// Queue an on-demand deep scan. Returns once queued.
    pub fn deep_scan_device(&self, mac: &str) -> Result<DeviceId> {
        let device = self.find_device(mac)?;
        if device.ip_address.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
            return Err(DiscoverError::NoIpAddress(device.mac_address));
        }
        self.inner.deep_scans.submit(device.id);
        Ok(device.id)
    }
}

impl Inner {
    fn emit(&self, payload: EventPayload) {
        // No subscribers is fine.
        let _ = self.events.send(WatchEvent::new(payload));
    }

    async fn execute(&self, mut run: ScanRun, permit: FlightPermit) -> ScanRun {
        let started = Instant::now();
        let mut transcript = Transcript::new();

        match self.discover_and_reconcile(&mut run, &mut transcript).await {
            Ok((records, summary)) => {
                transcript.append_skipped(&summary.skipped_log);
                let found = records.saturating_sub(summary.skipped as usize) as u32;
                if let Err(e) = run.complete(found, summary.created, transcript.into_string()) {
                    tracing::error!(scan_id = %run.id, error = %e, "Scan state transition rejected");
                }
                tracing::info!(
                    scan_id = %run.id,
                    devices_found = found,
                    new_devices = summary.created,
                    updated = summary.updated,
                    duplicates = summary.duplicates,
                    skipped = summary.skipped,
                    "Scan completed"
                );
                self.emit(EventPayload::ScanCompleted {
                    scan_id: run.id,
                    devices_found: run.devices_found,
                    new_devices: run.new_devices,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(e) => {
                tracing::error!(scan_id = %run.id, error = %e, "Scan failed");
                let log = (!transcript.is_empty()).then(|| transcript.into_string());
                if let Err(state) = run.fail(&e.to_string(), log) {
                    tracing::error!(scan_id = %run.id, error = %state, "Scan state transition rejected");
                }
                self.emit(EventPayload::ScanFailed {
                    scan_id: run.id,
                    error: run.error_message.clone().unwrap_or_default(),
                });
            }
        }

        if let Err(e) = self.deps.ledger.save_run(&run) {
            tracing::error!(scan_id = %run.id, error = %e, "Failed to persist final scan state");
        }
        permit.finish();
        run
    }

    /// Returns the adapter's record count and the reconciliation tallies.
    async fn discover_and_reconcile(
        &self,
        run: &mut ScanRun,
        transcript: &mut Transcript,
    ) -> Result<(usize, ReconcileSummary)> {
        let offline = self.deps.registry.mark_all_offline()?;
        tracing::debug!(scan_id = %run.id, devices = offline, "Marked devices offline");

        let range = parse_range(&run.network_range)?;
        let timeout = self.scan_timeout();
        let preference = DiscoveryTool::from_setting(
            &self.settings.get(SCANNER_TOOL, DiscoveryTool::default().as_str()),
        );

        let adapter = self.selector.select(preference).await;
        run.scanner_tool = Some(adapter.tool().as_str().to_string());
        self.deps.ledger.save_run(run)?;

        let records = adapter.discover(&range, timeout, transcript).await?;
        tracing::info!(scan_id = %run.id, tool = adapter.tool().as_str(), hosts = records.len(), "Discovery finished");

        let mut reconciler = Reconciler::new(&self.deps, run.id);
        for record in &records {
            let (outcome, device) = reconciler.reconcile(record)?;

            if let (ReconcileOutcome::Created { device_id }, Some(device)) = (&outcome, &device) {
                if self.auto_deep_scan && device.ip_address.is_some() {
                    self.deep_scans.submit(*device_id);
                }
            }

            self.emit(EventPayload::HostReconciled {
                scan_id: run.id,
                ip: record.ip.clone(),
                mac: record.mac.clone(),
                outcome,
            });
        }

        Ok((records.len(), reconciler.finish()))
    }

    fn scan_timeout(&self) -> Duration {
        let raw = self
            .settings
            .get(SCAN_TIMEOUT, &DEFAULT_SCAN_TIMEOUT_SECS.to_string());
        let secs = match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!(value = %raw, "Invalid scan timeout setting, using default");
                DEFAULT_SCAN_TIMEOUT_SECS
            }
        };
        Duration::from_secs(secs)
    }
}
