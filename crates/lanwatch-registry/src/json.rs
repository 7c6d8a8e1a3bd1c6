//! JSON-file backed registry and ledger.
//!
//! Keeps the full state in memory and rewrites the affected file after
//! every mutation:
//! ```text
//! {root}/
//!   devices.json
//!   scans.json
//!   results.json
//! ```
//! Files are written to a temporary sibling and renamed into place so a crash
//! mid-write never leaves a truncated file behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use lanwatch_core::{Device, DeviceId, ScanId, ScanResult, ScanRun};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::memory::RegistryState;
use crate::store::{DeviceRegistry, ScanLedger};

const DEVICES_FILE: &str = "devices.json";
const SCANS_FILE: &str = "scans.json";
const RESULTS_FILE: &str = "results.json";

pub struct JsonStore {
    root: PathBuf,
    state: Mutex<RegistryState>,
}

impl JsonStore {
    /// Open (or create) a store rooted at the given directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let devices: Vec<Device> = read_or_default(&root.join(DEVICES_FILE))?;
        let runs: Vec<ScanRun> = read_or_default(&root.join(SCANS_FILE))?;
        let results: Vec<ScanResult> = read_or_default(&root.join(RESULTS_FILE))?;

        tracing::debug!(
            root = %root.display(),
            devices = devices.len(),
            scans = runs.len(),
            "Opened JSON store"
        );

        let state = RegistryState {
            devices: devices.into_iter().map(|d| (d.id, d)).collect(),
            runs: runs.into_iter().map(|r| (r.id, r)).collect(),
            results,
        };

        Ok(Self {
            root,
            state: Mutex::new(state),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Applies `change` to a copy of the state and writes it out with `flush`.
    /// The in-memory state only moves forward once the write succeeded.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut RegistryState) -> Result<T>,
        flush: fn(&Self, &RegistryState) -> Result<()>,
    ) -> Result<T> {
        let mut state = self.lock()?;
        let mut staged = state.clone();
        let out = change(&mut staged)?;
        flush(self, &staged)?;
        *state = staged;
        Ok(out)
    }

    fn flush_devices(&self, state: &RegistryState) -> Result<()> {
        write_atomic(&self.root.join(DEVICES_FILE), &state.sorted_devices())
    }

    fn flush_runs(&self, state: &RegistryState) -> Result<()> {
        write_atomic(&self.root.join(SCANS_FILE), &state.sorted_runs())
    }

    fn flush_results(&self, state: &RegistryState) -> Result<()> {
        write_atomic(&self.root.join(RESULTS_FILE), &state.results)
    }
}

impl DeviceRegistry for JsonStore {
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
        self.commit(|state| state.save_device(device), Self::flush_devices)
    }

    fn all(&self) -> Result<Vec<Device>> {
        Ok(self.lock()?.sorted_devices())
    }

    fn mark_all_offline(&self) -> Result<usize> {
        if !self.lock()?.devices.values().any(|d| d.online) {
            return Ok(0);
        }
        self.commit(
            |state| {
                let mut touched = 0;
                for device in state.devices.values_mut().filter(|d| d.online) {
                    device.online = false;
                    touched += 1;
                }
                Ok(touched)
            },
            Self::flush_devices,
        )
    }
}

impl ScanLedger for JsonStore {
    fn save_run(&self, run: &ScanRun) -> Result<()> {
        self.commit(
            |state| {
                state.runs.insert(run.id, run.clone());
                Ok(())
            },
            Self::flush_runs,
        )
    }

    fn save_result(&self, result: &ScanResult) -> Result<()> {
        self.commit(
            |state| {
                if !state.runs.contains_key(&result.scan_id) {
                    return Err(StoreError::ScanNotFound(result.scan_id));
                }
                state.results.push(result.clone());
                Ok(())
            },
            Self::flush_results,
        )
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

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let json = fs::read_to_string(path)?;
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&json)?)
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
