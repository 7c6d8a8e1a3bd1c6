//! lanwatch-core: Shared types for the LAN watcher.
//!
//! This crate provides the foundational types used across all lanwatch components:
//! - Per-scan observations (`HostRecord`) and persistent identities (`Device`)
//! - Scan lifecycle records (`ScanRun`, `ScanResult`)
//! - MAC address normalization and placeholder generation
//! - Event types for downstream consumers
//! - Common error types

pub mod error;
pub mod events;
pub mod mac;
pub mod types;

pub use error::WatchError;
pub use types::{
    Device, DeviceId, DeviceType, HostRecord, ReconcileOutcome, ScanId, ScanResult, ScanRun,
    ScanStatus, ScanType,
};
