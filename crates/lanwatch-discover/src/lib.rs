//! lanwatch-discover: LAN discovery and device reconciliation engine.
//!
//! Picks a discovery tool (arp-scan, nmap ping-scan, or a plain IP sweep),
//! parses its output into host records, reconciles them against the device
//! registry, and runs deep nmap probes on newly discovered devices.

pub mod adapters;
pub mod classify;
pub mod config;
pub mod deep_scan;
pub mod error;
pub mod flight;
pub mod orchestrator;
pub mod parse;
pub mod probe;
pub mod process;
pub mod reconcile;
pub mod scheduler;
pub mod transcript;
pub mod vendor;
