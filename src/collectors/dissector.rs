//! Frame dissection
//!
//! Turns one captured Ethernet frame into a `PacketEvent`. Every frame yields
//! exactly one event: truncated headers degrade to zero addresses and no
//! ports rather than being dropped.

use log::trace;
use pnet::packet::Packet;
use pnet::packet::arp::ArpPacket;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

use crate::collectors::packet_source::CapturedFrame;
use crate::models::protocols::{
    PROTOCOL_NOT_SUPPORTED, arp_operation_info, icmp_message, igmp_message, rarp_operation_info,
    tcp_flags_info,
};
use crate::models::{PacketEvent, PacketKind};

/// Offset of the flags byte inside the TCP header
const TCP_FLAGS_OFFSET: usize = 13;

pub fn dissect(frame: &CapturedFrame<'_>) -> PacketEvent {
    let mut event = PacketEvent {
        timestamp: frame.timestamp,
        length: frame.length,
        source_mac: String::new(),
        dest_mac: String::new(),
        kind: PacketKind::Other(0),
        source_addr: Ipv4Addr::UNSPECIFIED,
        dest_addr: Ipv4Addr::UNSPECIFIED,
        source_port: None,
        dest_port: None,
        info: String::new(),
    };

    let Some(ethernet) = EthernetPacket::new(frame.data) else {
        trace!("Frame of {} bytes is shorter than an Ethernet header", frame.data.len());
        return event;
    };

    event.source_mac = format_mac(ethernet.get_source());
    event.dest_mac = format_mac(ethernet.get_destination());

    match ethernet.get_ethertype() {
        EtherTypes::Arp => {
            event.kind = PacketKind::Arp;
            dissect_arp(&ethernet, &mut event, arp_operation_info);
        }
        EtherTypes::Rarp => {
            event.kind = PacketKind::Rarp;
            dissect_arp(&ethernet, &mut event, rarp_operation_info);
        }
        EtherTypes::Ipv4 => dissect_ipv4(&ethernet, &mut event),
        EtherType(other) => event.kind = PacketKind::Other(other),
    }

    event
}

fn dissect_arp(
    ethernet: &EthernetPacket<'_>,
    event: &mut PacketEvent,
    describe: fn(u16) -> &'static str,
) {
    if let Some(arp) = ArpPacket::new(ethernet.payload()) {
        event.source_addr = arp.get_sender_proto_addr();
        event.dest_addr = arp.get_target_proto_addr();
        event.info = describe(arp.get_operation().0).to_string();
    }
}

fn dissect_ipv4(ethernet: &EthernetPacket<'_>, event: &mut PacketEvent) {
    let Some(ipv4) = Ipv4Packet::new(ethernet.payload()) else {
        event.kind = PacketKind::OtherIp(0);
        event.info = PROTOCOL_NOT_SUPPORTED.to_string();
        return;
    };

    event.source_addr = ipv4.get_source();
    event.dest_addr = ipv4.get_destination();

    // IHL counts 32-bit words; slice from the raw header so options are skipped
    // even when the frame was cut short by the snap length.
    let header_len = usize::from(ipv4.get_header_length()) * 4;
    let transport = ethernet.payload().get(header_len..).unwrap_or(&[]);

    match ipv4.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => {
            event.kind = PacketKind::Tcp;
            if let Some(tcp) = TcpPacket::new(transport) {
                event.source_port = Some(tcp.get_source());
                event.dest_port = Some(tcp.get_destination());
                event.info = tcp_flags_info(tcp.packet()[TCP_FLAGS_OFFSET]);
            }
        }
        IpNextHeaderProtocols::Udp => {
            event.kind = PacketKind::Udp;
            if let Some(udp) = UdpPacket::new(transport) {
                event.source_port = Some(udp.get_source());
                event.dest_port = Some(udp.get_destination());
            }
        }
        IpNextHeaderProtocols::Icmp => {
            event.kind = PacketKind::Icmp;
            if let Some(icmp) = IcmpPacket::new(transport) {
                event.info = icmp_message(icmp.get_icmp_type().0).to_string();
            }
        }
        IpNextHeaderProtocols::Igmp => {
            event.kind = PacketKind::Igmp;
            if let Some(&igmp_type) = transport.first() {
                event.info = igmp_message(igmp_type).to_string();
            }
        }
        IpNextHeaderProtocol(other) => {
            event.kind = PacketKind::OtherIp(other);
            event.info = PROTOCOL_NOT_SUPPORTED.to_string();
        }
    }
}

fn format_mac(mac: MacAddr) -> String {
    let MacAddr(a, b, c, d, e, f) = mac;
    format!("{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{f:02X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaptureTimestamp;

    const SRC_MAC: [u8; 6] = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
    const DST_MAC: [u8; 6] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff];

    fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&DST_MAC);
        frame.extend_from_slice(&SRC_MAC);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn arp(operation: u16, sender: [u8; 4], target: [u8; 4]) -> Vec<u8> {
        let mut body = vec![0x00, 0x01, 0x08, 0x00, 6, 4];
        body.extend_from_slice(&operation.to_be_bytes());
        body.extend_from_slice(&SRC_MAC);
        body.extend_from_slice(&sender);
        body.extend_from_slice(&[0; 6]);
        body.extend_from_slice(&target);
        body
    }

    fn ipv4(
        protocol: u8,
        source: [u8; 4],
        dest: [u8; 4],
        options: usize,
        transport: &[u8],
    ) -> Vec<u8> {
        let ihl = 5 + options as u8;
        let total = 20 + options * 4 + transport.len();
        let mut header = vec![0x40 | ihl, 0];
        header.extend_from_slice(&(total as u16).to_be_bytes());
        header.extend_from_slice(&[0, 0, 0x40, 0, 64, protocol, 0, 0]);
        header.extend_from_slice(&source);
        header.extend_from_slice(&dest);
        header.extend(std::iter::repeat_n(0u8, options * 4));
        header.extend_from_slice(transport);
        header
    }

    fn tcp(source: u16, dest: u16, flags: u8) -> Vec<u8> {
        let mut segment = Vec::new();
        segment.extend_from_slice(&source.to_be_bytes());
        segment.extend_from_slice(&dest.to_be_bytes());
        segment.extend_from_slice(&[0; 8]);
        segment.push(0x50);
        segment.push(flags);
        segment.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 0]);
        segment
    }

    fn udp(source: u16, dest: u16) -> Vec<u8> {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&source.to_be_bytes());
        datagram.extend_from_slice(&dest.to_be_bytes());
        datagram.extend_from_slice(&[0, 8, 0, 0]);
        datagram
    }

    fn dissect_bytes(data: &[u8]) -> PacketEvent {
        let frame = CapturedFrame {
            timestamp: CaptureTimestamp::new(1_700_000_000, 42),
            length: data.len() as u32,
            data,
        };
        dissect(&frame)
    }

    #[test]
    fn test_arp_request() {
        let event = dissect_bytes(&ethernet(0x0806, &arp(1, [192, 168, 1, 10], [192, 168, 1, 1])));

        assert_eq!(event.kind, PacketKind::Arp);
        assert_eq!(event.kind.protocol_id(), 0x0806);
        assert_eq!(event.info, "ARP request");
        assert_eq!(event.source_addr, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(event.dest_addr, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(event.source_port, None);
        assert_eq!(event.source_mac, "00:1A:2B:3C:4D:5E");
        assert_eq!(event.dest_mac, "FF:FF:FF:FF:FF:FF");
    }

    #[test]
    fn test_arp_response_and_unnamed_operation() {
        let event = dissect_bytes(&ethernet(0x0806, &arp(2, [10, 0, 0, 1], [10, 0, 0, 2])));
        assert_eq!(event.info, "ARP response");

        let event = dissect_bytes(&ethernet(0x0806, &arp(8, [10, 0, 0, 1], [10, 0, 0, 2])));
        assert_eq!(event.info, "");
    }

    #[test]
    fn test_rarp_request() {
        let event = dissect_bytes(&ethernet(0x8035, &arp(3, [0, 0, 0, 0], [0, 0, 0, 0])));
        assert_eq!(event.kind, PacketKind::Rarp);
        assert_eq!(event.info, "RARP request");
    }

    #[test]
    fn test_tcp_ports_and_flags() {
        let segment = tcp(53211, 443, 0x12);
        let frame = ethernet(0x0800, &ipv4(6, [192, 168, 1, 10], [93, 184, 216, 34], 0, &segment));
        let event = dissect_bytes(&frame);

        assert_eq!(event.kind, PacketKind::Tcp);
        assert_eq!(event.source_addr, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(event.dest_addr, Ipv4Addr::new(93, 184, 216, 34));
        assert_eq!(event.source_port, Some(53211));
        assert_eq!(event.dest_port, Some(443));
        assert_eq!(event.info, "SYN ACK");
    }

    #[test]
    fn test_ip_options_shift_transport_header() {
        let segment = tcp(8080, 22, 0x01);
        let frame = ethernet(0x0800, &ipv4(6, [10, 0, 0, 5], [10, 0, 0, 6], 2, &segment));
        let event = dissect_bytes(&frame);

        assert_eq!(event.source_port, Some(8080));
        assert_eq!(event.dest_port, Some(22));
        assert_eq!(event.info, "FIN");
    }

    #[test]
    fn test_udp_has_ports_and_no_info() {
        let frame = ethernet(0x0800, &ipv4(17, [192, 168, 1, 10], [8, 8, 8, 8], 0, &udp(5353, 53)));
        let event = dissect_bytes(&frame);

        assert_eq!(event.kind, PacketKind::Udp);
        assert_eq!(event.source_port, Some(5353));
        assert_eq!(event.dest_port, Some(53));
        assert_eq!(event.info, "");
    }

    #[test]
    fn test_icmp_messages() {
        let echo = [8, 0, 0, 0, 0, 1, 0, 1];
        let frame = ethernet(0x0800, &ipv4(1, [192, 168, 1, 10], [8, 8, 8, 8], 0, &echo));
        let event = dissect_bytes(&frame);
        assert_eq!(event.kind, PacketKind::Icmp);
        assert_eq!(event.info, "Echo Request");
        assert_eq!(event.dest_port, None);

        let unknown = [42, 0, 0, 0, 0, 0, 0, 0];
        let frame = ethernet(0x0800, &ipv4(1, [8, 8, 8, 8], [192, 168, 1, 10], 0, &unknown));
        assert_eq!(dissect_bytes(&frame).info, "unknown ICMP message type");
    }

    #[test]
    fn test_igmp_messages() {
        let report = [0x22, 0, 0, 0, 0, 0, 0, 0];
        let frame = ethernet(0x0800, &ipv4(2, [192, 168, 1, 10], [224, 0, 0, 22], 0, &report));
        let event = dissect_bytes(&frame);
        assert_eq!(event.kind, PacketKind::Igmp);
        assert_eq!(event.info, "IGMPv3 Membership Report");

        let unknown = [0x99, 0, 0, 0];
        let frame = ethernet(0x0800, &ipv4(2, [192, 168, 1, 10], [224, 0, 0, 1], 0, &unknown));
        assert_eq!(dissect_bytes(&frame).info, "unknown IGMP message type");
    }

    #[test]
    fn test_unsupported_ip_protocol() {
        let frame = ethernet(0x0800, &ipv4(47, [10, 0, 0, 1], [10, 0, 0, 2], 0, &[0; 8]));
        let event = dissect_bytes(&frame);

        assert_eq!(event.kind, PacketKind::OtherIp(47));
        assert_eq!(event.kind.protocol_id(), 0);
        assert_eq!(event.info, "protocol not supported");
        assert_eq!(event.source_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(event.source_port, None);
    }

    #[test]
    fn test_other_ethertype() {
        let event = dissect_bytes(&ethernet(0x86dd, &[0; 40]));

        assert_eq!(event.kind, PacketKind::Other(0x86dd));
        assert_eq!(event.kind.protocol_id(), 0x86dd);
        assert_eq!(event.source_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(event.dest_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(event.source_port, None);
        assert_eq!(event.info, "");
    }

    #[test]
    fn test_truncated_frames_still_produce_events() {
        let event = dissect_bytes(&[0u8; 6]);
        assert_eq!(event.kind, PacketKind::Other(0));
        assert_eq!(event.length, 6);

        // TCP header cut off by the snap length
        let syn = tcp(1000, 80, 0x02);
        let mut frame = ethernet(0x0800, &ipv4(6, [192, 168, 1, 10], [1, 1, 1, 1], 0, &syn));
        frame.truncate(14 + 20 + 10);
        let event = dissect_bytes(&frame);
        assert_eq!(event.kind, PacketKind::Tcp);
        assert_eq!(event.source_port, None);
        assert_eq!(event.info, "");
    }
}
