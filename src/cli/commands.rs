use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::analyzers::LocalNetwork;

/// Main CLI structure for the lan-watcher application
#[derive(Parser)]
#[command(author = "Kaipo Chen")]
#[command(version)]
#[command(about = "LAN traffic monitor - per-user, per-host and per-application statistics from captured frames")]
#[command(long_about = "lan-watcher captures Ethernet frames on a local interface (or replays a capture file), \
dissects ARP, RARP, IPv4, TCP, UDP, ICMP and IGMP, and attributes traffic to the local users that sent or \
received it. Statistics are refreshed once per second.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List capture devices with their IPv4 address and netmask
    #[command(about = "List capture devices")]
    Devices,

    /// Capture and aggregate traffic until Ctrl+C, the packet limit or end of file
    #[command(about = "Capture and aggregate LAN traffic")]
    #[command(long_about = "Opens a capture device (or a saved capture file) and prints per-user traffic \
statistics once per second. Press Ctrl+C to stop. Live capture usually requires elevated privileges.\n\n\
Examples:\n  \
lanw capture                              # Default device, everything\n  \
lanw capture -I eth0 -f \"tcp port 443\"    # Only HTTPS on eth0\n  \
lanw capture -c 1000 --packets            # Stop after 1000 packets, print each one\n  \
lanw capture --read-file trace.pcap       # Replay a saved capture\n  \
lanw capture --network 10.0.0.1/8 --json  # Explicit local network, JSON snapshots")]
    Capture(CaptureArgs),
}

/// Flags for `lanw capture`; each one overrides the configuration file
#[derive(Args, Debug, Default)]
pub struct CaptureArgs {
    /// Network interface to capture on
    #[arg(short = 'I', long, help = "Capture on a specific network interface")]
    pub interface: Option<String>,

    /// pcap filter expression
    #[arg(short, long, help = "Capture filter expression, e.g. \"udp port 53\"")]
    pub filter: Option<String>,

    /// Stop after this many packets
    #[arg(short = 'c', long, help = "Stop after this many packets (0 = no limit)")]
    pub count: Option<u64>,

    #[arg(long, help = "Do not put the interface into promiscuous mode")]
    pub no_promiscuous: bool,

    #[arg(long, help = "Maximum bytes captured per frame")]
    pub snaplen: Option<i32>,

    /// Read timeout in milliseconds
    #[arg(long, help = "Read timeout in milliseconds")]
    pub timeout: Option<i32>,

    #[arg(long, help = "Port names file (PROTO PORT=Description per line)")]
    pub ports_file: Option<PathBuf>,

    /// Replay a saved capture file instead of opening a device
    #[arg(long, help = "Read frames from a pcap file instead of a device")]
    pub read_file: Option<PathBuf>,

    #[arg(long, help = "Do not resolve user and host names")]
    pub no_resolve: bool,

    #[arg(long, help = "Print every captured packet")]
    pub packets: bool,

    #[arg(long, help = "Print snapshots as JSON lines")]
    pub json: bool,

    #[arg(long, help = "Configuration file (default: lanw.toml if present)")]
    pub config: Option<PathBuf>,

    /// Local network as ADDR/MASK or ADDR/PREFIX
    #[arg(long, help = "Local network, e.g. 192.168.1.0/255.255.255.0 or 192.168.1.0/24")]
    pub network: Option<LocalNetwork>,
}
