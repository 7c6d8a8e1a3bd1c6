//! Collaborator traits consumed by the discovery engine.

use lanwatch_core::{Device, DeviceId, ScanId, ScanResult, ScanRun};

use crate::error::Result;

/// Persistent device identities, keyed logically by MAC.
pub trait DeviceRegistry: Send + Sync {
    fn find_by_mac(&self, mac: &str) -> Result<Option<Device>>;

    /// Several rows may transiently share an IP; the most recently seen wins.
    fn find_by_ip(&self, ip: &str) -> Result<Option<Device>>;

    fn find_by_id(&self, id: DeviceId) -> Result<Option<Device>>;

    /// Insert or update by `Device::id`. Rejects a MAC owned by another row.
    fn save(&self, device: Device) -> Result<Device>;

    fn all(&self) -> Result<Vec<Device>>;

    /// Flag every device offline. Returns how many rows were touched.
    fn mark_all_offline(&self) -> Result<usize> {
        let mut touched = 0;
        for mut device in self.all()? {
            if device.online {
                device.online = false;
                self.save(device)?;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

/// Scan history: one `ScanRun` per scan, one `ScanResult` per reconciled host.
pub trait ScanLedger: Send + Sync {
    /// Insert or replace a run by id.
    fn save_run(&self, run: &ScanRun) -> Result<()>;

    fn save_result(&self, result: &ScanResult) -> Result<()>;

    fn find_run(&self, id: ScanId) -> Result<Option<ScanRun>>;

    /// All runs, newest `started_at` first.
    fn list_runs(&self) -> Result<Vec<ScanRun>>;

    fn most_recent(&self) -> Result<Option<ScanRun>> {
        Ok(self.list_runs()?.into_iter().next())
    }

    fn results_for(&self, scan_id: ScanId) -> Result<Vec<ScanResult>>;
}
