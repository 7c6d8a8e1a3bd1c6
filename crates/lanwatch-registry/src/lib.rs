//! lanwatch-registry: persistence collaborators for the discovery engine.
//!
//! The engine only talks to the traits in [`store`] and [`settings`]. Two
//! backends are provided: an in-memory store for tests and embedding, and a
//! JSON-file store that keeps the registry and scan history under a data
//! directory.

pub mod error;
pub mod json;
pub mod memory;
pub mod settings;
pub mod store;

pub use error::{Result, StoreError};
pub use json::JsonStore;
pub use memory::MemoryStore;
pub use settings::{ConfigSettings, MapSettings, Settings};
pub use store::{DeviceRegistry, ScanLedger};
