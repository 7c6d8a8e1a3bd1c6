//! End-to-end scans over canned tool output, persisted to a JSON store in a
//! temp directory.
//!
//! The live-network test needs arp-scan or nmap and root. Run with:
//! cargo test --package lanwatch-discover --test integration -- --ignored

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use lanwatch_core::events::EventPayload;
use lanwatch_core::{DeviceType, ScanStatus, ScanType};
use lanwatch_registry::settings::{SCANNER_TOOL, SCAN_RANGE};
use lanwatch_registry::{DeviceRegistry, JsonStore, MapSettings, ScanLedger, Settings};

use lanwatch_discover::adapters::{ArpSweepAdapter, IpSweepAdapter, PingScanAdapter, ToolChain};
use lanwatch_discover::classify::RuleClassifier;
use lanwatch_discover::config::Privilege;
use lanwatch_discover::deep_scan::{DeepScanPool, DeepScanner};
use lanwatch_discover::error::Result;
use lanwatch_discover::orchestrator::{ScanOrchestrator, EVENT_CAPACITY};
use lanwatch_discover::probe::{HostProbe, PathProbe, SystemHostProbe, ToolProbe};
use lanwatch_discover::process::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};
use lanwatch_discover::reconcile::Collaborators;
use lanwatch_discover::vendor::OuiVendorLookup;

const ARP_SCAN: &[&str] = &[
    "Interface: eth0, type: EN10MB, MAC: dc:a6:32:00:11:22, IPv4: 192.168.1.2",
    "192.168.1.1\t00:14:6c:aa:bb:cc\tNETGEAR",
    "192.168.1.50\t00:11:32:aa:bb:cc\tSynology Incorporated",
    "2 packets received by filter, 0 packets dropped by kernel",
];

const NMAP_DEEP: &[&str] = &[
    "Nmap scan report for nas.lan (192.168.1.50)",
    "5000/tcp open  http    nginx",
    "OS details: Linux 4.4",
];

/// Answers `which` for arp-scan only, and serves canned arp-scan/nmap output.
struct CannedTools;

#[async_trait]
impl ProcessRunner for CannedTools {
    async fn run(&self, command: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput> {
        let lines: &[&str] = match command.program.as_str() {
            "arp-scan" => ARP_SCAN,
            "nmap" if command.args.iter().any(|a| a == "-A") => NMAP_DEEP,
            _ => &[],
        };
        Ok(ProcessOutput {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            exit_code: Some(0),
            timed_out: false,
        })
    }
}

struct OnlyArpScan;

#[async_trait]
impl ToolProbe for OnlyArpScan {
    async fn available(&self, tool: &str) -> bool {
        tool == "arp-scan"
    }
}

struct Quiet;

#[async_trait]
impl HostProbe for Quiet {
    async fn is_reachable(&self, _ip: IpAddr, _timeout: Duration) -> bool {
        false
    }

    async fn neighbor_mac(&self, _ip: IpAddr) -> Option<String> {
        None
    }

    async fn reverse_dns(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}

fn build(
    store: Arc<JsonStore>,
    runner: Arc<dyn ProcessRunner>,
    tools: Arc<dyn ToolProbe>,
    hosts: Arc<dyn HostProbe>,
    settings: Arc<dyn Settings>,
    privilege: Privilege,
) -> ScanOrchestrator {
    let selector = ToolChain::new(
        tools,
        Arc::new(ArpSweepAdapter::new(Arc::clone(&runner), Arc::clone(&hosts), privilege)),
        Arc::new(PingScanAdapter::new(Arc::clone(&runner), privilege)),
        Arc::new(IpSweepAdapter::new(hosts, Duration::from_millis(200), 16)),
    );
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let pool = DeepScanPool::new(
        DeepScanner::new(runner, privilege, Duration::from_secs(60)),
        store.clone(),
        2,
        events.clone(),
    );
    ScanOrchestrator::new(
        Collaborators {
            registry: store.clone(),
            ledger: store,
            vendors: Arc::new(OuiVendorLookup),
            classifier: Arc::new(RuleClassifier),
        },
        settings,
        Arc::new(selector),
        Arc::new(pool),
        events,
        true,
    )
}

#[tokio::test]
async fn scan_persists_devices_and_deep_scans_new_ones() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::open(dir.path()).unwrap());
    let settings = Arc::new(MapSettings::new().with(SCAN_RANGE, "192.168.1.0/24"));
    let orchestrator = build(
        store.clone(),
        Arc::new(CannedTools),
        Arc::new(OnlyArpScan),
        Arc::new(Quiet),
        settings,
        Privilege::Root,
    );
    let mut events = orchestrator.subscribe();

    let run = orchestrator
        .start_scan(ScanType::Manual)
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(run.status, ScanStatus::Completed);
    assert_eq!(run.scanner_tool.as_deref(), Some("arp-scan"));
    assert_eq!(run.devices_found, 2);
    assert_eq!(run.new_devices, 2);
    assert!(run.scan_log.as_deref().unwrap().contains("Command: arp-scan 192.168.1.0/24"));

    let router = store.find_by_mac("00:14:6C:AA:BB:CC").unwrap().unwrap();
    assert_eq!(router.vendor.as_deref(), Some("NETGEAR"));
    assert_eq!(router.device_type, DeviceType::Router);

    // Both new devices get a deep scan; wait for the two completion events.
    let mut deep_done = 0;
    while deep_done < 2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        if matches!(event.payload, EventPayload::DeepScanFinished { .. }) {
            deep_done += 1;
        }
    }

    // Everything survives a reopen.
    let reopened = JsonStore::open(dir.path()).unwrap();
    let nas = reopened.find_by_mac("00:11:32:AA:BB:CC").unwrap().unwrap();
    assert_eq!(nas.hostname.as_deref(), Some("nas.lan"));
    assert_eq!(nas.open_ports.as_deref(), Some("5000/tcp (http - nginx)"));
    assert_eq!(nas.detected_os.as_deref(), Some("Linux 4.4"));
    assert!(nas.last_deep_scan.is_some());
    assert_eq!(reopened.results_for(run.id).unwrap().len(), 2);
    assert_eq!(reopened.most_recent().unwrap().map(|r| r.id), Some(run.id));
}

#[tokio::test]
async fn no_tools_falls_back_to_sweep() {
    struct Nothing;

    #[async_trait]
    impl ToolProbe for Nothing {
        async fn available(&self, _tool: &str) -> bool {
            false
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::open(dir.path()).unwrap());
    let settings = Arc::new(
        MapSettings::new()
            .with(SCAN_RANGE, "10.1.2.0/29")
            .with(SCANNER_TOOL, "arp-scan"),
    );
    let orchestrator = build(
        store.clone(),
        Arc::new(CannedTools),
        Arc::new(Nothing),
        Arc::new(Quiet),
        settings,
        Privilege::Root,
    );

    let run = orchestrator
        .start_scan(ScanType::Manual)
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(run.status, ScanStatus::Completed);
    assert_eq!(run.scanner_tool.as_deref(), Some("ping"));
    assert_eq!(run.devices_found, 0);
    assert!(run.scan_log.unwrap().contains("Total addresses to scan: 6"));
    assert!(store.all().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires arp-scan or nmap and root on a real LAN"]
async fn live_scan_of_local_network() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::open(dir.path()).unwrap());
    let range = std::env::var("LANWATCH_TEST_RANGE").unwrap_or_else(|_| "192.168.1.0/24".into());
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let privilege = Privilege::detect(true).await;
    let orchestrator = build(
        store.clone(),
        Arc::clone(&runner),
        Arc::new(PathProbe::new(Arc::clone(&runner))),
        Arc::new(SystemHostProbe::new(runner, privilege)),
        Arc::new(MapSettings::new().with(SCAN_RANGE, &range)),
        privilege,
    );

    let run = orchestrator
        .start_scan(ScanType::Manual)
        .unwrap()
        .wait()
        .await
        .unwrap();
    eprintln!("{run:#?}");
    assert_eq!(run.status, ScanStatus::Completed);
}
