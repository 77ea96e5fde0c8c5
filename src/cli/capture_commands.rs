use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use pcap::Device;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::analyzers::{LocalNetwork, SystemResolver, TrafficWorker};
use crate::cli::commands::CaptureArgs;
use crate::cli::formatting::{display_name, format_bytes, format_kib_speed};
use crate::collectors::{CaptureEngine, PacketLimit};
use crate::config::AppConfig;
use crate::models::{EndReason, MonitorEvent, PacketEvent, Snapshot};

/// How many users the per-second text view lists
const MAX_USERS_SHOWN: usize = 10;

/// Where frames come from
#[derive(Debug, Clone)]
pub enum CaptureSource {
    Device(Device),
    File(PathBuf),
}

impl CaptureSource {
    /// Local network of the source: the device's first IPv4 address, or
    /// 0.0.0.0/255.255.255.0 when there is none
    pub fn network(&self) -> LocalNetwork {
        match self {
            CaptureSource::Device(device) => network_from_addresses(
                device.addresses.iter().map(|address| (address.addr, address.netmask)),
            )
            .unwrap_or_default(),
            CaptureSource::File(_) => LocalNetwork::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub packets: bool,
    pub json: bool,
}

pub struct CaptureCommandHandler {
    config: AppConfig,
    output: OutputMode,
}

impl CaptureCommandHandler {
    pub fn new(config: AppConfig, output: OutputMode) -> Self {
        Self { config, output }
    }

    pub async fn handle_capture_command(args: CaptureArgs) -> Result<()> {
        let config = resolve_config(&args)?;

        let source = match &args.read_file {
            Some(path) => CaptureSource::File(path.clone()),
            None => CaptureSource::Device(resolve_device(config.capture.device.as_deref())?),
        };
        let network = args.network.unwrap_or_else(|| source.network());

        let output = OutputMode {
            packets: args.packets,
            json: args.json,
        };
        Self::new(config, output).run(source, network).await
    }

    pub async fn run(&self, source: CaptureSource, network: LocalNetwork) -> Result<()> {
        if !self.output.json {
            if let CaptureSource::Device(device) = &source {
                println!("⚠️  Note: Packet capture requires elevated privileges (sudo/administrator)");
                println!("🔍 Capturing on {} (local network {network})", device.name);
            } else {
                println!("🔍 Replaying capture file (local network {network})");
            }
            if !self.config.capture.filter.is_empty() {
                println!("🔧 Filter: {}", self.config.capture.filter);
            }
            println!();
        }

        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();

        let mut worker =
            TrafficWorker::new(SystemResolver, self.config.analysis.worker_options(), monitor_tx);
        worker.configure(network);
        let worker = tokio::spawn(worker.run(capture_rx));

        let mut engine = CaptureEngine::new(capture_tx);
        let started = match &source {
            CaptureSource::Device(device) => {
                engine.start(&self.config.capture.params(&device.name))
            }
            CaptureSource::File(path) => engine.start_offline(
                path,
                &self.config.capture.filter,
                PacketLimit::from(self.config.capture.packet_limit),
            ),
        };
        started.context("Failed to start capture")?;
        let limit = engine.session().map(|session| session.packet_limit());
        if let (false, Some(PacketLimit::Packets(limit))) = (self.output.json, limit) {
            println!("🔢 Stopping after {limit} packets");
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("Failed to listen for Ctrl+C")?;
                    info!("Interrupted, stopping capture");
                    break;
                }
                event = monitor_rx.recv() => {
                    let Some(event) = event else { break };
                    let ended = matches!(event, MonitorEvent::CaptureEnded(_));
                    self.display(&event)?;
                    if ended {
                        break;
                    }
                }
            }
        }

        // stop() joins the capture thread
        let engine = tokio::task::spawn_blocking(move || {
            engine.stop();
            engine
        })
        .await
        .context("Capture shutdown task failed")?;
        drop(engine);

        while let Some(event) = monitor_rx.recv().await {
            self.display(&event)?;
        }

        let mut analyzer = worker.await.context("Aggregation task failed")?;
        let summary = analyzer.snapshot();
        if self.output.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(())
    }

    fn display(&self, event: &MonitorEvent) -> Result<()> {
        match event {
            MonitorEvent::Message(message) => eprintln!("{message}"),
            MonitorEvent::CaptureStarted => {
                if !self.output.json {
                    println!("📡 Capturing packets... (Press Ctrl+C to stop)\n");
                }
            }
            MonitorEvent::CaptureStopped => debug!("Capture stopped"),
            MonitorEvent::CaptureEnded(reason) => {
                if !self.output.json {
                    println!("{}", describe_end(reason));
                }
            }
            MonitorEvent::Packet(packet) => {
                if self.output.packets && !self.output.json {
                    println!("{}", packet_row(packet));
                }
            }
            MonitorEvent::NewUser { address, first_seen } => {
                if !self.output.json {
                    let first_seen = first_seen.format("%H:%M:%S");
                    println!("👤 New user {address} (first seen {first_seen})");
                }
            }
            MonitorEvent::NewUserName { address, name } => {
                if !self.output.json {
                    println!("👤 {address} is {name}");
                }
            }
            MonitorEvent::NewUserHost { user, host } => {
                debug!("{user} talks to {}", host.address);
            }
            MonitorEvent::NewUserApp { user, app } => {
                debug!("{user} uses port {} ({})", app.port, app.name);
            }
            MonitorEvent::NewHostName { address, name } => debug!("{address} resolved to {name}"),
            MonitorEvent::Snapshot(snapshot) => {
                if self.output.json {
                    println!("{}", serde_json::to_string(snapshot.as_ref())?);
                } else if !self.output.packets {
                    print_snapshot(snapshot);
                }
            }
        }
        Ok(())
    }
}

pub fn handle_devices_command() -> Result<()> {
    let devices = Device::list().context("Failed to list capture devices")?;
    if devices.is_empty() {
        println!("No capture devices found (listing may require elevated privileges)");
        return Ok(());
    }

    println!("{:<20} {:<34} {}", "DEVICE", "NETWORK", "DESCRIPTION");
    for device in devices {
        let network = network_from_addresses(
            device.addresses.iter().map(|address| (address.addr, address.netmask)),
        )
        .map(|network| network.to_string())
        .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<34} {}",
            device.name,
            network,
            device.desc.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Config file and environment, then flags; validated once all layers are in
pub fn resolve_config(args: &CaptureArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Configuration values replaced by command-line flags
pub fn apply_overrides(config: &mut AppConfig, args: &CaptureArgs) {
    if let Some(interface) = &args.interface {
        config.capture.device = Some(interface.clone());
    }
    if let Some(filter) = &args.filter {
        config.capture.filter.clone_from(filter);
    }
    if let Some(count) = args.count {
        config.capture.packet_limit = count;
    }
    if args.no_promiscuous {
        config.capture.promiscuous = false;
    }
    if let Some(snaplen) = args.snaplen {
        config.capture.snap_length = snaplen;
    }
    if let Some(timeout) = args.timeout {
        config.capture.read_timeout_ms = timeout;
    }
    if let Some(ports_file) = &args.ports_file {
        config.analysis.ports_file.clone_from(ports_file);
    }
    if args.no_resolve {
        config.analysis.resolve_names = false;
    }
}

fn resolve_device(requested: Option<&str>) -> Result<Device> {
    match requested {
        Some(name) => {
            let devices = Device::list().context("Failed to list capture devices")?;
            Ok(devices
                .into_iter()
                .find(|device| device.name == name)
                .unwrap_or_else(|| Device::from(name)))
        }
        None => Device::lookup()
            .context("Failed to look up the default capture device")?
            .ok_or_else(|| anyhow!("No capture device available; pass one with --interface")),
    }
}

/// First IPv4 address with its netmask; a missing netmask gets the class C default
pub fn network_from_addresses(
    addresses: impl IntoIterator<Item = (IpAddr, Option<IpAddr>)>,
) -> Option<LocalNetwork> {
    addresses.into_iter().find_map(|(address, netmask)| {
        let IpAddr::V4(address) = address else {
            return None;
        };
        let mask = match netmask {
            Some(IpAddr::V4(mask)) => mask,
            _ => LocalNetwork::default().mask,
        };
        Some(LocalNetwork::new(mask, address))
    })
}

fn describe_end(reason: &EndReason) -> String {
    match reason {
        EndReason::PacketLimit => "✅ Packet limit reached".to_string(),
        EndReason::EndOfStream => "✅ End of capture file".to_string(),
        EndReason::ReadError(e) => format!("❌ Capture read failed: {e}"),
    }
}

fn packet_row(packet: &PacketEvent) -> String {
    format!(
        "{} {:<6} {:<44} {:>6}  {}",
        packet.timestamp,
        packet.kind.label(),
        packet.connection_string(),
        packet.length,
        packet.info
    )
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "📊 {} | {} pkt/s | ↑ {} ({}) | ↓ {} ({})",
        snapshot.taken_at.format("%H:%M:%S"),
        snapshot.packets_per_second,
        format_kib_speed(snapshot.upload_kib_per_sec),
        format_bytes(snapshot.upload_bytes),
        format_kib_speed(snapshot.download_kib_per_sec),
        format_bytes(snapshot.download_bytes),
    );
    let [arp, rarp, icmp, igmp, tcp, udp, other, total] = snapshot.packets.as_array();
    println!(
        "   ARP {arp}  RARP {rarp}  ICMP {icmp}  IGMP {igmp}  TCP {tcp}  UDP {udp}  \
         other {other}  total {total}"
    );

    let mut users: Vec<_> = snapshot.users.iter().collect();
    users.sort_by(|a, b| {
        let a_total = a.upload_bytes + a.download_bytes;
        let b_total = b.upload_bytes + b.download_bytes;
        b_total.cmp(&a_total)
    });
    for user in users.iter().take(MAX_USERS_SHOWN) {
        println!(
            "   {:<28} ↑ {:>12} ↓ {:>12}  {} hosts, {} apps",
            display_name(&user.name, user.address),
            format_kib_speed(user.upload_kib_per_sec),
            format_kib_speed(user.download_kib_per_sec),
            user.hosts.len(),
            user.apps.len()
        );
    }
    if !snapshot.multicast.is_empty() {
        println!("   {} multicast group(s)", snapshot.multicast.len());
    }
    println!();
}

fn print_summary(snapshot: &Snapshot) {
    println!();
    println!("📈 Capture summary");
    println!("{}", "═".repeat(50));
    println!("Total Packets: {}", snapshot.packets.total);
    println!("Uploaded:      {}", format_bytes(snapshot.upload_bytes));
    println!("Downloaded:    {}", format_bytes(snapshot.download_bytes));
    println!("Users:         {}", snapshot.users.len());
    println!();

    for user in &snapshot.users {
        println!(
            "👤 {} ({}) ↑ {} ↓ {}",
            display_name(&user.name, user.address),
            user.address,
            format_bytes(user.upload_bytes),
            format_bytes(user.download_bytes)
        );
        let mut apps: Vec<_> = user.apps.iter().collect();
        apps.sort_by(|a, b| {
            (b.upload_bytes + b.download_bytes).cmp(&(a.upload_bytes + a.download_bytes))
        });
        for app in apps.iter().take(5) {
            let name = if app.name.is_empty() { "?" } else { app.name.as_str() };
            println!(
                "     port {:<6} {:<30} ↑ {} ↓ {}",
                app.port,
                name,
                format_bytes(app.upload_bytes),
                format_bytes(app.download_bytes)
            );
        }
    }

    for group in &snapshot.multicast {
        let members: Vec<String> = group
            .participants
            .iter()
            .map(|p| p.address.to_string())
            .collect();
        println!("📢 {} -> {}", group.group, members.join(", "));
    }
}
