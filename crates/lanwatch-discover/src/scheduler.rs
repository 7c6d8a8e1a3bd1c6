//! Periodic scan trigger.
//!
//! One ticker task starts a scheduled scan every `interval_secs`. A tick that
//! lands while any scan is running is skipped, not queued.

use std::sync::Arc;

use lanwatch_core::ScanType;
use lanwatch_registry::settings::SCHEDULER_ENABLED;
use lanwatch_registry::Settings;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::error::{DiscoverError, Result};
use crate::orchestrator::ScanOrchestrator;

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    Busy,
    Ran,
}

pub struct ScanScheduler {
    config: SchedulerConfig,
    orchestrator: ScanOrchestrator,
    settings: Arc<dyn Settings>,
}

impl ScanScheduler {
    pub fn new(config: SchedulerConfig, orchestrator: ScanOrchestrator, settings: Arc<dyn Settings>) -> Self {
        Self {
            config,
            orchestrator,
            settings,
        }
    }

    /// Run forever. The first scan starts one full interval after startup.
    pub async fn run(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled in config");
            return Ok(());
        }

        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        tracing::info!(interval_secs = period.as_secs(), "Scheduler started");
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Scheduled scan could not start");
            }
        }
    }

    /// Start one scheduled scan and wait for it, honouring the runtime
    /// `scheduler.enabled` setting.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let enabled = self.settings.get(SCHEDULER_ENABLED, "true");
        if !enabled.trim().eq_ignore_ascii_case("true") {
            tracing::debug!("Scheduled scans disabled by setting");
            return Ok(TickOutcome::Disabled);
        }

        if self.orchestrator.is_scan_in_progress() {
            tracing::warn!("Scheduled scan skipped, another scan is running");
            return Ok(TickOutcome::Busy);
        }

        tracing::info!("Scheduled scan triggered");
        let handle = match self.orchestrator.start_scan(ScanType::Scheduled) {
            Ok(handle) => handle,
            Err(DiscoverError::ScanInProgress) => {
                tracing::warn!("Scheduled scan skipped, another scan is running");
                return Ok(TickOutcome::Busy);
            }
            Err(e) => return Err(e),
        };

        let run = handle.wait().await?;
        tracing::info!(
            scan_id = %run.id,
            status = %run.status,
            devices_found = run.devices_found,
            new_devices = run.new_devices,
            "Scheduled scan finished"
        );
        Ok(TickOutcome::Ran)
    }
}
