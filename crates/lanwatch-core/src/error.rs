use thiserror::Error;

use crate::types::{ScanId, ScanStatus};

/// Top-level error type for lanwatch domain operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Scan {scan_id} is already {status} and cannot transition again")]
    ScanAlreadyFinished { scan_id: ScanId, status: ScanStatus },

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
