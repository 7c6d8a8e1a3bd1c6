//! Error types for the lanwatch-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid network range {range:?}: {reason}")]
    InvalidRange { range: String, reason: String },

    #[error("Device {0} has no IP address to probe")]
    NoIpAddress(String),

    #[error("Deep scan already running for device {0}")]
    DeepScanInProgress(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] lanwatch_registry::StoreError),

    #[error("Scan state error: {0}")]
    State(#[from] lanwatch_core::WatchError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
