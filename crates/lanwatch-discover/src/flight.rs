//! Single-flight guard: at most one discovery scan at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide "a scan is running" flag.
#[derive(Debug, Default)]
pub struct ScanFlight {
    running: AtomicBool,
}

impl ScanFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag. `None` if a scan is already running.
    pub fn try_start(self: &Arc<Self>) -> Option<FlightPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                flight: Arc::clone(self),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of one scan. Dropping it, on any path, clears the flag.
#[derive(Debug)]
pub struct FlightPermit {
    flight: Arc<ScanFlight>,
}

impl FlightPermit {
    pub fn finish(self) {}
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.flight.running.store(false, Ordering::Release);
    }
}
