//! Error types for the registry crate.

use lanwatch_core::{DeviceId, ScanId};

/// Errors that can occur during registry and ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("MAC {mac} already belongs to device {owner}")]
    DuplicateMac { mac: String, owner: DeviceId },

    #[error("Scan not found: {0}")]
    ScanNotFound(ScanId),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
