use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::models::protocols::{
    ETHERTYPE_ARP, ETHERTYPE_RARP, IP_PROTO_ICMP, IP_PROTO_IGMP, IP_PROTO_TCP, IP_PROTO_UDP,
};

/// One captured frame after dissection
///
/// `source_addr`/`dest_addr` are `0.0.0.0` when the frame carries no IPv4 or
/// ARP addressing; ports are `None` for everything that is not TCP or UDP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEvent {
    pub timestamp: CaptureTimestamp,
    /// Length on the wire, not the captured (snap) length
    pub length: u32,
    pub source_mac: String,
    pub dest_mac: String,
    pub kind: PacketKind,
    pub source_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub source_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureTimestamp {
    pub seconds: i64,
    pub micros: i64,
}

/// Protocol classification of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Arp,
    Rarp,
    Icmp,
    Igmp,
    Tcp,
    Udp,
    /// IPv4 with a transport protocol we do not dissect
    OtherIp(u8),
    /// Any other EtherType
    Other(u16),
}

/// Transport layer carrying a port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    Tcp,
    Udp,
}

impl CaptureTimestamp {
    pub fn new(seconds: i64, micros: i64) -> Self {
        Self { seconds, micros }
    }

    pub fn to_local(&self) -> DateTime<Local> {
        let nanos = u32::try_from(self.micros.clamp(0, 999_999) * 1000).unwrap_or(0);
        Local
            .timestamp_opt(self.seconds, nanos)
            .single()
            .unwrap_or_else(Local::now)
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.to_local().format("%H:%M:%S"), self.micros)
    }
}

impl PacketKind {
    /// Numeric identifier: the EtherType for link-layer kinds, the IP protocol
    /// number for dissected IPv4 kinds, 0 for undissected IPv4
    pub fn protocol_id(&self) -> u16 {
        match self {
            PacketKind::Arp => ETHERTYPE_ARP,
            PacketKind::Rarp => ETHERTYPE_RARP,
            PacketKind::Icmp => u16::from(IP_PROTO_ICMP),
            PacketKind::Igmp => u16::from(IP_PROTO_IGMP),
            PacketKind::Tcp => u16::from(IP_PROTO_TCP),
            PacketKind::Udp => u16::from(IP_PROTO_UDP),
            PacketKind::OtherIp(_) => 0,
            PacketKind::Other(ethertype) => *ethertype,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(
            self,
            PacketKind::Icmp
                | PacketKind::Igmp
                | PacketKind::Tcp
                | PacketKind::Udp
                | PacketKind::OtherIp(_)
        )
    }

    pub fn transport(&self) -> Option<Transport> {
        match self {
            PacketKind::Tcp => Some(Transport::Tcp),
            PacketKind::Udp => Some(Transport::Udp),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PacketKind::Arp => "ARP".to_string(),
            PacketKind::Rarp => "RARP".to_string(),
            PacketKind::Icmp => "ICMP".to_string(),
            PacketKind::Igmp => "IGMP".to_string(),
            PacketKind::Tcp => "TCP".to_string(),
            PacketKind::Udp => "UDP".to_string(),
            PacketKind::OtherIp(proto) => format!("IP/{proto}"),
            PacketKind::Other(ethertype) => format!("0x{ethertype:04x}"),
        }
    }
}

impl PacketEvent {
    pub fn connection_string(&self) -> String {
        match (self.source_port, self.dest_port) {
            (Some(src_port), Some(dst_port)) => format!(
                "{}:{src_port} -> {}:{dst_port}",
                self.source_addr, self.dest_addr
            ),
            _ => format!("{} -> {}", self.source_addr, self.dest_addr),
        }
    }
}
