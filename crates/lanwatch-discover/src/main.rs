//! CLI entry point for the lanwatch discovery engine.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_core::{ScanRun, ScanType};
use lanwatch_registry::{ConfigSettings, JsonStore, Settings};

use lanwatch_discover::adapters::{ArpSweepAdapter, IpSweepAdapter, PingScanAdapter, ToolChain};
use lanwatch_discover::classify::RuleClassifier;
use lanwatch_discover::config::{DiscoverConfig, Privilege};
use lanwatch_discover::deep_scan::{DeepScanPool, DeepScanner};
use lanwatch_discover::orchestrator::{ScanOrchestrator, EVENT_CAPACITY};
use lanwatch_discover::probe::{HostProbe, PathProbe, SystemHostProbe};
use lanwatch_discover::process::{ProcessRunner, SystemRunner};
use lanwatch_discover::reconcile::Collaborators;
use lanwatch_discover::scheduler::ScanScheduler;
use lanwatch_discover::vendor::OuiVendorLookup;

#[derive(Parser)]
#[command(name = "lanwatch")]
#[command(about = "LAN device discovery and inventory")]
struct Cli {
    /// Config file prefix (default: lanwatch).
    #[arg(short, long, default_value = "lanwatch", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one manual scan and print the result.
    Scan {
        /// Exit without waiting for queued deep scans.
        #[arg(long)]
        no_wait: bool,
    },
    /// Run scheduled scans until interrupted.
    Daemon,
    /// Deep-scan one device now.
    DeepScan {
        #[arg(long)]
        mac: String,
    },
    /// List known devices.
    Devices,
    /// List recent scans.
    Scans {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

struct App {
    config: DiscoverConfig,
    settings: Arc<dyn Settings>,
    orchestrator: ScanOrchestrator,
    deep_scans: DeepScanPool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let app = build_app(&cli.config).await?;

    match cli.command {
        Command::Scan { no_wait } => {
            let handle = app.orchestrator.start_scan(ScanType::Manual)?;
            let run = handle.wait().await?;
            print_run(&run);
            if !no_wait {
                wait_for_deep_scans(&app.deep_scans).await;
            }
        }
        Command::Daemon => {
            let scheduler = ScanScheduler::new(
                app.config.scheduler.clone(),
                app.orchestrator.clone(),
                Arc::clone(&app.settings),
            );
            tokio::select! {
                res = scheduler.run() => res?,
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
            }
        }
        Command::DeepScan { mac } => {
            let device = app.orchestrator.find_device(&mac)?;
            let device = app.deep_scans.run_now(device.id).await?;
            println!("{}", serde_json::to_string_pretty(&device)?);
        }
        Command::Devices => {
            for device in app.orchestrator.devices()? {
                println!(
                    "{:<18} {:<16} {:<7} {:<20} {}",
                    device.mac_address,
                    device.ip_address.as_deref().unwrap_or("-"),
                    if device.online { "online" } else { "offline" },
                    device.device_type.to_string(),
                    device.display_name(),
                );
            }
        }
        Command::Scans { limit } => {
            for run in app.orchestrator.recent_scans(limit)? {
                print_run(&run);
            }
        }
    }

    Ok(())
}

async fn build_app(file_prefix: &str) -> anyhow::Result<App> {
    let cfg = load_config(file_prefix)?;
    let config = match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "No usable [discover] section, using defaults");
            DiscoverConfig::default()
        }
    };
    let settings: Arc<dyn Settings> = Arc::new(ConfigSettings::from_config(&cfg));

    let store = Arc::new(JsonStore::open(&config.data_dir)?);
    tracing::info!(data_dir = %store.root().display(), "Opened device registry");

    let privilege = Privilege::detect(config.use_sudo).await;
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let hosts: Arc<dyn HostProbe> = Arc::new(SystemHostProbe::new(Arc::clone(&runner), privilege));

    let selector = ToolChain::new(
        Arc::new(PathProbe::new(Arc::clone(&runner))),
        Arc::new(ArpSweepAdapter::new(Arc::clone(&runner), Arc::clone(&hosts), privilege)),
        Arc::new(PingScanAdapter::new(Arc::clone(&runner), privilege)),
        Arc::new(IpSweepAdapter::new(
            hosts,
            config.ping_timeout(),
            config.sweep_concurrency,
        )),
    );

    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let deep_scans = DeepScanPool::new(
        DeepScanner::new(runner, privilege, config.deep_scan_timeout()),
        store.clone(),
        config.deep_scan_workers,
        events.clone(),
    );

    let orchestrator = ScanOrchestrator::new(
        Collaborators {
            registry: store.clone(),
            ledger: store,
            vendors: Arc::new(OuiVendorLookup),
            classifier: Arc::new(RuleClassifier),
        },
        Arc::clone(&settings),
        Arc::new(selector),
        Arc::new(deep_scans.clone()),
        events,
        config.auto_deep_scan,
    );

    Ok(App {
        config,
        settings,
        orchestrator,
        deep_scans,
    })
}

fn load_config(file_prefix: &str) -> anyhow::Result<config::Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LANWATCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

async fn wait_for_deep_scans(pool: &DeepScanPool) {
    let pending = pool.pending();
    if pending == 0 {
        return;
    }
    tracing::info!(pending, "Waiting for deep scans to finish");
    while pool.pending() > 0 {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

fn print_run(run: &ScanRun) {
    println!(
        "{}  {:<9} {:<9} range={} tool={} found={} new={}{}",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.scan_type.to_string(),
        run.status.to_string(),
        run.network_range,
        run.scanner_tool.as_deref().unwrap_or("-"),
        run.devices_found,
        run.new_devices,
        run.error_message
            .as_deref()
            .map(|e| format!(" error={e}"))
            .unwrap_or_default(),
    );
}
