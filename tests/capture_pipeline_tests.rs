mod common;

use async_trait::async_trait;
use lan_watcher::analyzers::{LocalNetwork, NameResolver, TrafficWorker, WorkerOptions};
use lan_watcher::collectors::{CaptureEngine, PacketLimit, ReplaySource};
use lan_watcher::models::{CaptureEvent, EndReason, MonitorEvent, Severity};
use std::collections::HashMap;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use common::{arp_request, tcp_frame, udp_frame};

/// End-to-end tests: replayed frames -> capture thread -> aggregation task

const USER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
const REMOTE: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);
const GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Answers from a fixed table
struct TableResolver(HashMap<Ipv4Addr, String>);

#[async_trait]
impl NameResolver for TableResolver {
    async fn reverse_lookup(&self, address: Ipv4Addr) -> Option<String> {
        self.0.get(&address).cloned()
    }
}

fn resolver() -> TableResolver {
    TableResolver(HashMap::from([
        (USER, "desktop.lan".to_string()),
        (REMOTE, "example.com".to_string()),
    ]))
}

fn network() -> LocalNetwork {
    LocalNetwork::new(Ipv4Addr::new(255, 255, 255, 0), Ipv4Addr::new(192, 168, 1, 5))
}

fn configured_worker(
    options: WorkerOptions,
    events: UnboundedSender<MonitorEvent>,
) -> TrafficWorker<TableResolver> {
    let mut worker = TrafficWorker::new(resolver(), options, events);
    worker.configure(network());
    worker
}

fn ports_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "TCP 443=HTTP protocol over TLS/SSL").unwrap();
    writeln!(file, "UDP 1900=SSDP").unwrap();
    file
}

fn session_frames() -> Vec<Vec<u8>> {
    vec![
        arp_request(USER, GATEWAY),
        tcp_frame((USER, 53211), (REMOTE, 443), 946),
        tcp_frame((REMOTE, 443), (USER, 53211), 446),
        udp_frame((USER, 1900), (GROUP, 1900)),
    ]
}

/// Collects events until `stop` matches (inclusive) or the deadline passes
async fn collect_until(
    rx: &mut UnboundedReceiver<MonitorEvent>,
    deadline: Duration,
    stop: impl Fn(&MonitorEvent) -> bool,
) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    let _ = timeout(deadline, async {
        while let Some(event) = rx.recv().await {
            let done = stop(&event);
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    events
}

#[tokio::test]
async fn test_replayed_session_is_aggregated() {
    let ports = ports_file();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();

    let options = WorkerOptions {
        ports_file: ports.path().to_path_buf(),
        resolve_names: true,
    };
    let worker = tokio::spawn(configured_worker(options, monitor_tx).run(capture_rx));

    let mut engine = CaptureEngine::new(capture_tx);
    let source = ReplaySource::from_frames(session_frames());
    engine
        .start_with_source("replay", source, PacketLimit::Unbounded)
        .unwrap();

    let mut events = collect_until(&mut monitor_rx, Duration::from_secs(5), |e| {
        matches!(e, MonitorEvent::Snapshot(_))
    })
    .await;

    assert!(matches!(events.first(), Some(MonitorEvent::CaptureStarted)));
    let packets = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Packet(_)))
        .count();
    assert_eq!(packets, 4);
    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::CaptureEnded(EndReason::EndOfStream))));

    let new_users: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::NewUser { address, .. } => Some(*address),
            _ => None,
        })
        .collect();
    assert_eq!(new_users, vec![USER]);
    assert!(events.iter().any(|e| matches!(
        e,
        MonitorEvent::NewUserApp { user, app }
            if *user == USER && app.port == 443 && app.name == "HTTP protocol over TLS/SSL"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        MonitorEvent::NewUserName { address, name } if *address == USER && name == "desktop.lan"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        MonitorEvent::NewHostName { address, name } if *address == REMOTE && name == "example.com"
    )));

    let Some(MonitorEvent::Snapshot(snapshot)) = events.pop() else {
        panic!("no snapshot within the deadline");
    };
    assert_eq!(snapshot.packets.total, 4);
    assert_eq!(snapshot.packets.arp, 1);
    assert_eq!(snapshot.packets.tcp, 2);
    assert_eq!(snapshot.packets.udp, 1);
    assert_eq!(snapshot.packets_per_second, 4);
    assert_eq!(snapshot.upload_bytes, 1000);
    assert_eq!(snapshot.download_bytes, 500);
    assert_eq!(snapshot.users.len(), 1);

    let user = &snapshot.users[0];
    assert_eq!(user.address, USER);
    assert_eq!(user.name, "desktop.lan");
    assert_eq!(user.upload_bytes, 1000);
    assert_eq!(user.download_bytes, 500);
    assert_eq!(user.counts.outbound.tcp, 1);
    assert_eq!(user.counts.inbound.tcp, 1);
    assert_eq!(user.counts.all.arp, 0);
    assert_eq!(user.hosts.len(), 1);
    assert_eq!(user.hosts[0].name, "example.com");
    assert_eq!(snapshot.multicast.len(), 1);
    assert_eq!(snapshot.multicast[0].group, GROUP);

    assert!(engine.stop());
    drop(engine);
    let rest = collect_until(&mut monitor_rx, Duration::from_secs(5), |_| false).await;
    assert!(rest.iter().any(|e| matches!(e, MonitorEvent::CaptureStopped)));

    let analyzer = worker.await.unwrap();
    assert_eq!(analyzer.user_count(), 1);
    assert_eq!(analyzer.counters().packets.total, 4);
}

#[tokio::test]
async fn test_packet_limit_ends_session() {
    let ports = ports_file();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();

    let options = WorkerOptions {
        ports_file: ports.path().to_path_buf(),
        resolve_names: false,
    };
    let worker = tokio::spawn(configured_worker(options, monitor_tx).run(capture_rx));

    let frames = (0..10).map(|i| tcp_frame((USER, 40000 + i), (REMOTE, 443), 0));
    let mut engine = CaptureEngine::new(capture_tx);
    let source = ReplaySource::from_frames(frames);
    engine
        .start_with_source("replay", source, PacketLimit::Packets(3))
        .unwrap();

    let events = collect_until(&mut monitor_rx, Duration::from_secs(5), |e| {
        matches!(e, MonitorEvent::CaptureEnded(_))
    })
    .await;

    let packets = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Packet(_)))
        .count();
    assert_eq!(packets, 3);
    assert!(matches!(
        events.last(),
        Some(MonitorEvent::CaptureEnded(EndReason::PacketLimit))
    ));

    assert!(engine.stop());
    drop(engine);
    let rest = collect_until(&mut monitor_rx, Duration::from_secs(5), |_| false).await;
    // resolution is disabled
    assert!(!rest.iter().any(|e| matches!(e, MonitorEvent::NewUserName { .. })));

    let analyzer = worker.await.unwrap();
    let user = analyzer.user(USER).unwrap();
    assert_eq!(user.name, "");
    assert_eq!(user.counts.outbound.tcp, 3);
    assert_eq!(user.apps.len(), 1);
}

#[tokio::test]
async fn test_missing_ports_file_warns_and_continues() {
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();

    let options = WorkerOptions {
        ports_file: PathBuf::from("/nonexistent/ports.txt"),
        resolve_names: false,
    };
    let worker = tokio::spawn(configured_worker(options, monitor_tx).run(capture_rx));

    capture_tx.send(CaptureEvent::Started).unwrap();
    let events = collect_until(&mut monitor_rx, Duration::from_secs(2), |e| {
        matches!(e, MonitorEvent::Message(_))
    })
    .await;

    let Some(MonitorEvent::Message(message)) = events.last() else {
        panic!("expected a warning, got {events:?}");
    };
    assert_eq!(message.severity, Severity::Warning);
    assert!(message.body.starts_with("Unable to open port numbers file"));
    assert!(message.body.contains("Users application names not available"));

    drop(capture_tx);
    let analyzer = worker.await.unwrap();
    assert_eq!(analyzer.user_count(), 0);
}

#[tokio::test]
async fn test_snapshots_only_while_a_session_runs() {
    let ports = ports_file();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();

    let options = WorkerOptions {
        ports_file: ports.path().to_path_buf(),
        resolve_names: false,
    };
    let worker = tokio::spawn(configured_worker(options, monitor_tx).run(capture_rx));

    // idle: no timer
    assert!(timeout(Duration::from_millis(1500), monitor_rx.recv()).await.is_err());

    capture_tx.send(CaptureEvent::Started).unwrap();
    let events = collect_until(&mut monitor_rx, Duration::from_secs(3), |e| {
        matches!(e, MonitorEvent::Snapshot(_))
    })
    .await;
    assert!(matches!(events.first(), Some(MonitorEvent::CaptureStarted)));
    assert!(matches!(events.last(), Some(MonitorEvent::Snapshot(s)) if s.packets.total == 0));

    capture_tx.send(CaptureEvent::Stopped).unwrap();
    let events = collect_until(&mut monitor_rx, Duration::from_secs(2), |e| {
        matches!(e, MonitorEvent::CaptureStopped)
    })
    .await;
    assert!(matches!(events.last(), Some(MonitorEvent::CaptureStopped)));

    let after_stop = collect_until(&mut monitor_rx, Duration::from_millis(1500), |_| false).await;
    assert!(!after_stop.iter().any(|e| matches!(e, MonitorEvent::Snapshot(_))));

    drop(capture_tx);
    worker.await.unwrap();
}

#[tokio::test]
async fn test_users_follow_the_configured_network() {
    let ports = ports_file();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();
    let (monitor_tx, _monitor_rx) = mpsc::unbounded_channel();

    let options = WorkerOptions {
        ports_file: ports.path().to_path_buf(),
        resolve_names: false,
    };
    // default network is 0.0.0.0/255.255.255.0, so USER is not local
    let worker = TrafficWorker::new(resolver(), options, monitor_tx);
    let worker = tokio::spawn(worker.run(capture_rx));

    let mut engine = CaptureEngine::new(capture_tx);
    let source = ReplaySource::from_frames(session_frames());
    engine
        .start_with_source("replay", source, PacketLimit::Unbounded)
        .unwrap();
    for _ in 0..400 {
        if !engine.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.stop();
    drop(engine);

    let analyzer = worker.await.unwrap();
    assert_eq!(analyzer.counters().packets.total, 4);
    assert_eq!(analyzer.user_count(), 0);
    assert_eq!(analyzer.network(), LocalNetwork::default());
}

#[test]
fn test_missing_capture_file_fails_to_start() {
    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
    let mut engine = CaptureEngine::new(capture_tx);

    let result = engine.start_offline(
        std::path::Path::new("/nonexistent/trace.pcap"),
        "",
        PacketLimit::Unbounded,
    );

    assert!(result.is_err());
    assert!(!engine.is_running());
    assert!(matches!(
        capture_rx.try_recv(),
        Ok(CaptureEvent::Message(message)) if message.severity == Severity::Critical
    ));
    assert!(!engine.stop());
}
