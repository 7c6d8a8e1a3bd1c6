//! Maps host records onto persistent device identities.
//!
//! One [`Reconciler`] lives for one scan and must be fed records
//! sequentially; its dedup sets are what keep a single scan from touching
//! the same device twice.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use lanwatch_core::mac::placeholder_mac;
use lanwatch_core::{Device, DeviceType, HostRecord, ReconcileOutcome, ScanId, ScanResult};
use lanwatch_registry::{DeviceRegistry, ScanLedger};

use crate::classify::DeviceClassifier;
use crate::error::Result;
use crate::vendor::VendorLookup;

/// Vendor recorded for hosts seen without any MAC.
pub const CROSS_VLAN_VENDOR: &str = "Unknown (Cross-VLAN)";

/// External services reconciliation reads and writes.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn DeviceRegistry>,
    pub ledger: Arc<dyn ScanLedger>,
    pub vendors: Arc<dyn VendorLookup>,
    pub classifier: Arc<dyn DeviceClassifier>,
}

/// Tallies for one finished reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: u32,
    pub updated: u32,
    pub duplicates: u32,
    /// Records dropped because their IP belongs to a different real MAC.
    pub skipped: u32,
    /// One line per skipped record, for the scan transcript.
    pub skipped_log: Vec<String>,
}

/// Per-scan reconciliation state.
pub struct Reconciler<'a> {
    deps: &'a Collaborators,
    scan_id: ScanId,
    seen_ips: HashSet<String>,
    seen_macs: HashSet<String>,
    summary: ReconcileSummary,
}

impl<'a> Reconciler<'a> {
    pub fn new(deps: &'a Collaborators, scan_id: ScanId) -> Self {
        Self {
            deps,
            scan_id,
            seen_ips: HashSet::new(),
            seen_macs: HashSet::new(),
            summary: ReconcileSummary::default(),
        }
    }

    /// Reconcile one record. Only store errors propagate.
    pub fn reconcile(&mut self, record: &HostRecord) -> Result<(ReconcileOutcome, Option<Device>)> {
        let ip = record.ip.trim();
        if ip.is_empty() || self.seen_ips.contains(ip) {
            tracing::debug!(ip, "Skipping duplicate IP in scan output");
            self.summary.duplicates += 1;
            return Ok((ReconcileOutcome::DuplicateInScan, None));
        }
        let mac = record.mac.as_deref();
        if let Some(mac) = mac {
            if !self.seen_macs.insert(mac.to_string()) {
                tracing::debug!(mac, "Skipping duplicate MAC in scan output");
                self.summary.duplicates += 1;
                return Ok((ReconcileOutcome::DuplicateInScan, None));
            }
        }

        let registry = &self.deps.registry;
        let by_mac = match mac {
            Some(mac) => registry.find_by_mac(mac)?,
            None => None,
        };
        let by_ip = registry.find_by_ip(ip)?;

        let existing = match (by_mac, by_ip, mac) {
            (Some(device), _, _) => Some(device),
            (None, Some(device), None) => Some(device),
            (None, Some(device), Some(mac)) => {
                if device.mac_address.is_empty()
                    || device.has_placeholder_mac()
                    || device.mac_address == mac
                {
                    Some(device)
                } else {
                    return Ok(self.skip_conflict(ip, mac, &device));
                }
            }
            (None, None, _) => None,
        };

        let (mut device, is_new) = match existing {
            Some(device) => (device, false),
            None => self.new_device(ip, mac)?,
        };
        self.seen_ips.insert(ip.to_string());

        if let Some(mac) = mac {
            if device.mac_address != mac {
                tracing::info!(
                    ip,
                    old_mac = %device.mac_address,
                    new_mac = mac,
                    "Promoting device to observed MAC"
                );
            }
            device.mac_address = mac.to_string();
        }
        device.ip_address = Some(ip.to_string());
        if let Some(hostname) = record.hostname.as_deref().filter(|h| !h.is_empty()) {
            device.hostname = Some(hostname.to_string());
        }
        let vendor = match (record.vendor.as_deref(), mac) {
            (Some(vendor), _) if !vendor.is_empty() => vendor.to_string(),
            (_, Some(mac)) => self.deps.vendors.lookup(mac),
            _ => CROSS_VLAN_VENDOR.to_string(),
        };
        device.vendor = Some(vendor.clone());
        if device.device_type == DeviceType::Unknown {
            device.device_type = self.deps.classifier.classify(&device);
        }
        device.online = true;
        device.last_seen = Utc::now();

        let device = self.deps.registry.save(device)?;
        self.deps.ledger.save_result(&ScanResult {
            scan_id: self.scan_id,
            device_id: device.id,
            ip_address: ip.to_string(),
            mac_address: device.mac_address.clone(),
            hostname: record.hostname.clone(),
            vendor: Some(vendor),
            new_device: is_new,
            recorded_at: Utc::now(),
        })?;

        let outcome = if is_new {
            self.summary.created += 1;
            tracing::info!(ip, mac = %device.mac_address, device_id = %device.id, "New device discovered");
            ReconcileOutcome::Created { device_id: device.id }
        } else {
            self.summary.updated += 1;
            ReconcileOutcome::Updated { device_id: device.id }
        };
        Ok((outcome, Some(device)))
    }

    /// Fresh device keyed by the observed MAC or, failing that, an IP-derived
    /// placeholder. A placeholder row left by an earlier scan is reused.
    fn new_device(&self, ip: &str, mac: Option<&str>) -> Result<(Device, bool)> {
        let key = match mac {
            Some(mac) => mac.to_string(),
            None => {
                let placeholder = placeholder_mac(ip);
                if let Some(device) = self.deps.registry.find_by_mac(&placeholder)? {
                    return Ok((device, false));
                }
                placeholder
            }
        };
        let mut device = Device::new(key);
        device.known = false;
        Ok((device, true))
    }

    fn skip_conflict(&mut self, ip: &str, mac: &str, owner: &Device) -> (ReconcileOutcome, Option<Device>) {
        let line = format!(
            "Skipped: IP {ip} (MAC: {mac}) - IP already assigned to device '{}' (MAC: {})",
            owner.display_name(),
            owner.mac_address
        );
        tracing::info!(ip, mac, owner_mac = %owner.mac_address, "Skipping record, IP owned by another device");
        self.summary.skipped += 1;
        self.summary.skipped_log.push(line);
        self.seen_ips.insert(ip.to_string());
        (
            ReconcileOutcome::SkippedConflict {
                ip: ip.to_string(),
                mac: mac.to_string(),
                owner_mac: owner.mac_address.clone(),
            },
            None,
        )
    }

    pub fn summary(&self) -> &ReconcileSummary {
        &self.summary
    }

    pub fn finish(self) -> ReconcileSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RuleClassifier;
    use crate::vendor::OuiVendorLookup;
    use lanwatch_registry::MemoryStore;

    fn deps() -> (Arc<MemoryStore>, Collaborators) {
        let store = Arc::new(MemoryStore::new());
        let deps = Collaborators {
            registry: store.clone(),
            ledger: store.clone(),
            vendors: Arc::new(OuiVendorLookup),
            classifier: Arc::new(RuleClassifier),
        };
        (store, deps)
    }

    fn seed(store: &MemoryStore, mac: &str, ip: &str) -> Device {
        let mut device = Device::new(mac);
        device.ip_address = Some(ip.to_string());
        device.known = true;
        store.save(device).unwrap()
    }

    #[test]
    fn test_new_device_created() {
        let (store, deps) = deps();
        let mut rec = Reconciler::new(&deps, ScanId::new());
        let record = HostRecord::new("192.168.1.5")
            .with_mac("AA:BB:CC:DD:EE:FF")
            .with_vendor("VendorX");

        let (outcome, device) = rec.reconcile(&record).unwrap();
        assert!(outcome.is_new());
        let device = device.unwrap();
        assert!(!device.known);
        assert!(device.online);
        assert_eq!(device.vendor.as_deref(), Some("VendorX"));
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_in_scan_duplicates_dropped() {
        let (store, deps) = deps();
        let mut rec = Reconciler::new(&deps, ScanId::new());
        let a = HostRecord::new("10.0.0.2").with_mac("B8:27:EB:00:00:01");
        let same_ip = HostRecord::new("10.0.0.2").with_mac("B8:27:EB:00:00:02");
        let same_mac = HostRecord::new("10.0.0.3").with_mac("B8:27:EB:00:00:01");

        rec.reconcile(&a).unwrap();
        assert_eq!(rec.reconcile(&same_ip).unwrap().0, ReconcileOutcome::DuplicateInScan);
        assert_eq!(rec.reconcile(&same_mac).unwrap().0, ReconcileOutcome::DuplicateInScan);

        let summary = rec.finish();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_conflicting_ip_skipped() {
        let (store, deps) = deps();
        let owner = seed(&store, "AA:BB:CC:DD:EE:01", "192.168.1.10");
        let mut rec = Reconciler::new(&deps, ScanId::new());

        let record = HostRecord::new("192.168.1.10").with_mac("AA:BB:CC:DD:EE:02");
        let (outcome, device) = rec.reconcile(&record).unwrap();
        assert!(device.is_none());
        assert_eq!(
            outcome,
            ReconcileOutcome::SkippedConflict {
                ip: "192.168.1.10".into(),
                mac: "AA:BB:CC:DD:EE:02".into(),
                owner_mac: "AA:BB:CC:DD:EE:01".into(),
            }
        );

        assert_eq!(store.all().unwrap(), vec![owner]);
        let summary = rec.finish();
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.skipped_log[0],
            "Skipped: IP 192.168.1.10 (MAC: AA:BB:CC:DD:EE:02) - IP already assigned to device '192.168.1.10' (MAC: AA:BB:CC:DD:EE:01)"
        );
    }

    #[test]
    fn test_placeholder_promoted_to_real_mac() {
        let (store, deps) = deps();
        let phantom = seed(&store, &placeholder_mac("192.168.1.20"), "192.168.1.20");
        let mut rec = Reconciler::new(&deps, ScanId::new());

        let record = HostRecord::new("192.168.1.20").with_mac("00:14:6C:12:34:56");
        let (outcome, _) = rec.reconcile(&record).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated { device_id: phantom.id });

        let devices = store.all().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].mac_address, "00:14:6C:12:34:56");
        assert_eq!(devices[0].vendor.as_deref(), Some("Netgear"));
        assert_eq!(devices[0].device_type, DeviceType::Router);
        assert!(devices[0].known);
    }

    #[test]
    fn test_mac_less_host_gets_placeholder() {
        let (store, deps) = deps();
        let mut rec = Reconciler::new(&deps, ScanId::new());
        let record = HostRecord::new("10.20.0.15").with_hostname("printer.office");

        let (outcome, device) = rec.reconcile(&record).unwrap();
        assert!(outcome.is_new());
        let device = device.unwrap();
        assert_eq!(device.mac_address, placeholder_mac("10.20.0.15"));
        assert_eq!(device.vendor.as_deref(), Some(CROSS_VLAN_VENDOR));
        assert_eq!(device.device_type, DeviceType::Printer);

        // Seen again in a later scan: same row, not a second phantom.
        let mut next = Reconciler::new(&deps, ScanId::new());
        let (outcome, _) = next.reconcile(&record).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Updated { device_id: device.id });
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_classified_type_not_overwritten() {
        let (store, deps) = deps();
        let mut device = Device::new("00:14:6C:00:00:09");
        device.ip_address = Some("10.0.0.9".into());
        device.device_type = DeviceType::Camera;
        store.save(device).unwrap();

        let mut rec = Reconciler::new(&deps, ScanId::new());
        let record = HostRecord::new("10.0.0.9").with_mac("00:14:6C:00:00:09");
        let (_, device) = rec.reconcile(&record).unwrap();
        assert_eq!(device.unwrap().device_type, DeviceType::Camera);
    }
}
