//! Event types for downstream consumers.
//!
//! The scan orchestrator publishes these on a broadcast channel so a UI or
//! notifier can follow scan progress without polling the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ReconcileOutcome, ScanId, ScanType};

/// An event emitted by the discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl WatchEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    // ── Scan lifecycle ────────────────────────────────────────
    ScanStarted {
        scan_id: ScanId,
        scan_type: ScanType,
        network_range: String,
    },
    ScanCompleted {
        scan_id: ScanId,
        devices_found: u32,
        new_devices: u32,
        duration_ms: u64,
    },
    ScanFailed {
        scan_id: ScanId,
        error: String,
    },

    // ── Reconciliation ────────────────────────────────────────
    /// One host record went through the reconciler.
    HostReconciled {
        scan_id: ScanId,
        ip: String,
        mac: Option<String>,
        outcome: ReconcileOutcome,
    },

    // ── Deep scans ────────────────────────────────────────────
    DeepScanFinished {
        mac: String,
        open_ports: Option<String>,
        detected_os: Option<String>,
    },
}
