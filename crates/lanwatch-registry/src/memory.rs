//! In-memory registry and ledger.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use lanwatch_core::{Device, DeviceId, ScanId, ScanResult, ScanRun};

use crate::error::{Result, StoreError};
use crate::store::{DeviceRegistry, ScanLedger};

/// Plain registry + ledger contents, shared by the memory and JSON stores.
#[derive(Debug, Default, Clone)]
pub(crate) struct RegistryState {
    pub devices: HashMap<DeviceId, Device>,
    pub runs: HashMap<ScanId, ScanRun>,
    pub results: Vec<ScanResult>,
}

impl RegistryState {
    pub fn find_by_mac(&self, mac: &str) -> Option<Device> {
        self.devices
            .values()
            .find(|d| d.mac_address == mac)
            .cloned()
    }

    pub fn find_by_ip(&self, ip: &str) -> Option<Device> {
        self.devices
            .values()
            .filter(|d| d.ip_address.as_deref() == Some(ip))
            .max_by_key(|d| d.last_seen)
            .cloned()
    }

    pub fn save_device(&mut self, device: Device) -> Result<Device> {
        if let Some(owner) = self
            .devices
            .values()
            .find(|d| d.mac_address == device.mac_address && d.id != device.id)
        {
            return Err(StoreError::DuplicateMac {
                mac: device.mac_address.clone(),
                owner: owner.id,
            });
        }
        self.devices.insert(device.id, device.clone());
        Ok(device)
    }

    pub fn sorted_devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.mac_address.cmp(&b.mac_address)));
        devices
    }

    pub fn sorted_runs(&self) -> Vec<ScanRun> {
        let mut runs: Vec<ScanRun> = self.runs.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    pub fn results_for(&self, scan_id: ScanId) -> Vec<ScanResult> {
        self.results
            .iter()
            .filter(|r| r.scan_id == scan_id)
            .cloned()
            .collect()
    }
}

/// Thread-safe, process-local store. Clone the `Arc` around it, not the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<RegistryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DeviceRegistry for MemoryStore {
    fn find_by_mac(&self, mac: &str) -> Result<Option<Device>> {
        Ok(self.lock()?.find_by_mac(mac))
    }

    fn find_by_ip(&self, ip: &str) -> Result<Option<Device>> {
        Ok(self.lock()?.find_by_ip(ip))
    }

    fn find_by_id(&self, id: DeviceId) -> Result<Option<Device>> {
        Ok(self.lock()?.devices.get(&id).cloned())
    }

    fn save(&self, device: Device) -> Result<Device> {
        self.lock()?.save_device(device)
    }

    fn all(&self) -> Result<Vec<Device>> {
        Ok(self.lock()?.sorted_devices())
    }

    fn mark_all_offline(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let mut touched = 0;
        for device in state.devices.values_mut().filter(|d| d.online) {
            device.online = false;
            touched += 1;
        }
        Ok(touched)
    }
}

impl ScanLedger for MemoryStore {
    fn save_run(&self, run: &ScanRun) -> Result<()> {
        self.lock()?.runs.insert(run.id, run.clone());
        Ok(())
    }

    fn save_result(&self, result: &ScanResult) -> Result<()> {
        let mut state = self.lock()?;
        if !state.runs.contains_key(&result.scan_id) {
            return Err(StoreError::ScanNotFound(result.scan_id));
        }
        state.results.push(result.clone());
        Ok(())
    }

    fn find_run(&self, id: ScanId) -> Result<Option<ScanRun>> {
        Ok(self.lock()?.runs.get(&id).cloned())
    }

    fn list_runs(&self) -> Result<Vec<ScanRun>> {
        Ok(self.lock()?.sorted_runs())
    }

    fn results_for(&self, scan_id: ScanId) -> Result<Vec<ScanResult>> {
        Ok(self.lock()?.results_for(scan_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lanwatch_core::ScanType;

    fn device(mac: &str, ip: &str) -> Device {
        let mut d = Device::new(mac);
        d.ip_address = Some(ip.to_string());
        d
    }

    #[test]
    fn lookup_by_mac_and_ip() {
        let store = MemoryStore::new();
        let saved = store.save(device("AA:BB:CC:DD:EE:01", "192.168.1.10")).unwrap();

        assert_eq!(store.find_by_mac("AA:BB:CC:DD:EE:01").unwrap().unwrap().id, saved.id);
        assert_eq!(store.find_by_ip("192.168.1.10").unwrap().unwrap().id, saved.id);
        assert!(store.find_by_mac("AA:BB:CC:DD:EE:02").unwrap().is_none());
        assert!(store.find_by_ip("192.168.1.11").unwrap().is_none());
    }

    #[test]
    fn shared_ip_returns_most_recently_seen() {
        let store = MemoryStore::new();
        let mut old = device("AA:BB:CC:DD:EE:01", "192.168.1.10");
        old.last_seen = Utc::now() - Duration::hours(2);
        store.save(old).unwrap();
        let fresh = store.save(device("AA:BB:CC:DD:EE:02", "192.168.1.10")).unwrap();

        assert_eq!(store.find_by_ip("192.168.1.10").unwrap().unwrap().id, fresh.id);
    }

    #[test]
    fn rejects_second_row_with_same_mac() {
        let store = MemoryStore::new();
        store.save(device("AA:BB:CC:DD:EE:01", "192.168.1.10")).unwrap();
        let err = store
            .save(device("AA:BB:CC:DD:EE:01", "192.168.1.11"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMac { .. }));
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn update_keeps_identity_when_mac_changes() {
        let store = MemoryStore::new();
        let mut d = store.save(device("fe:00:01:02:03:04", "10.0.0.5")).unwrap();
        d.mac_address = "AA:BB:CC:DD:EE:05".to_string();
        store.save(d.clone()).unwrap();

        assert_eq!(store.all().unwrap().len(), 1);
        assert!(store.find_by_mac("fe:00:01:02:03:04").unwrap().is_none());
        assert_eq!(store.find_by_mac("AA:BB:CC:DD:EE:05").unwrap().unwrap().id, d.id);
    }

    #[test]
    fn mark_all_offline_counts_online_rows() {
        let store = MemoryStore::new();
        let mut a = device("AA:BB:CC:DD:EE:01", "10.0.0.1");
        a.online = true;
        store.save(a).unwrap();
        store.save(device("AA:BB:CC:DD:EE:02", "10.0.0.2")).unwrap();

        assert_eq!(store.mark_all_offline().unwrap(), 1);
        assert!(store.all().unwrap().iter().all(|d| !d.online));
    }

    #[test]
    fn runs_listed_newest_first() {
        let store = MemoryStore::new();
        let mut first = ScanRun::start(ScanType::Manual, "10.0.0.0/24");
        first.started_at = Utc::now() - Duration::minutes(5);
        let second = ScanRun::start(ScanType::Scheduled, "10.0.0.0/24");
        store.save_run(&first).unwrap();
        store.save_run(&second).unwrap();

        let runs = store.list_runs().unwrap();
        assert_eq!(runs[0].id, second.id);
        assert_eq!(store.most_recent().unwrap().unwrap().id, second.id);
        assert_eq!(store.find_run(first.id).unwrap().unwrap().scan_type, ScanType::Manual);
    }

    #[test]
    fn result_requires_known_scan() {
        let store = MemoryStore::new();
        let result = ScanResult {
            scan_id: ScanId::new(),
            device_id: DeviceId::new(),
            ip_address: "10.0.0.1".to_string(),
            mac_address: "AA:BB:CC:DD:EE:01".to_string(),
            hostname: None,
            vendor: None,
            new_device: true,
            recorded_at: Utc::now(),
        };
        assert!(matches!(
            store.save_result(&result).unwrap_err(),
            StoreError::ScanNotFound(_)
        ));
    }
}
