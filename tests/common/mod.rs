//! Hand-built Ethernet frames for pipeline tests

#![allow(dead_code)]

use std::net::Ipv4Addr;

pub const USER_MAC: [u8; 6] = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];
pub const GATEWAY_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

pub fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&GATEWAY_MAC);
    frame.extend_from_slice(&USER_MAC);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub fn ipv4(protocol: u8, source: Ipv4Addr, dest: Ipv4Addr, transport: &[u8]) -> Vec<u8> {
    let total = 20 + transport.len();
    let mut header = vec![0x45, 0];
    header.extend_from_slice(&(total as u16).to_be_bytes());
    header.extend_from_slice(&[0, 0, 0x40, 0, 64, protocol, 0, 0]);
    header.extend_from_slice(&source.octets());
    header.extend_from_slice(&dest.octets());
    header.extend_from_slice(transport);
    header
}

/// TCP segment with `payload` zero bytes after the header
pub fn tcp_frame(source: (Ipv4Addr, u16), dest: (Ipv4Addr, u16), payload: usize) -> Vec<u8> {
    let mut segment = Vec::new();
    segment.extend_from_slice(&source.1.to_be_bytes());
    segment.extend_from_slice(&dest.1.to_be_bytes());
    segment.extend_from_slice(&[0; 8]);
    segment.push(0x50);
    segment.push(0x18); // PSH ACK
    segment.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 0]);
    segment.extend(std::iter::repeat_n(0u8, payload));
    ethernet(0x0800, &ipv4(6, source.0, dest.0, &segment))
}

pub fn udp_frame(source: (Ipv4Addr, u16), dest: (Ipv4Addr, u16)) -> Vec<u8> {
    let mut datagram = Vec::new();
    datagram.extend_from_slice(&source.1.to_be_bytes());
    datagram.extend_from_slice(&dest.1.to_be_bytes());
    datagram.extend_from_slice(&[0, 8, 0, 0]);
    ethernet(0x0800, &ipv4(17, source.0, dest.0, &datagram))
}

pub fn arp_request(sender: Ipv4Addr, target: Ipv4Addr) -> Vec<u8> {
    let mut body = vec![0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01];
    body.extend_from_slice(&USER_MAC);
    body.extend_from_slice(&sender.octets());
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(&target.octets());
    ethernet(0x0806, &body)
}

/// Classic libpcap savefile (microsecond timestamps, Ethernet link type)
/// holding `frames` one second apart
pub fn pcap_file(frames: &[Vec<u8>]) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut contents = Vec::new();
    contents.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    contents.extend_from_slice(&2u16.to_le_bytes());
    contents.extend_from_slice(&4u16.to_le_bytes());
    contents.extend_from_slice(&0i32.to_le_bytes());
    contents.extend_from_slice(&0u32.to_le_bytes());
    contents.extend_from_slice(&65535u32.to_le_bytes());
    contents.extend_from_slice(&1u32.to_le_bytes());

    for (i, frame) in frames.iter().enumerate() {
        let length = frame.len() as u32;
        contents.extend_from_slice(&(PCAP_EPOCH + i as u32).to_le_bytes());
        contents.extend_from_slice(&0u32.to_le_bytes());
        contents.extend_from_slice(&length.to_le_bytes());
        contents.extend_from_slice(&length.to_le_bytes());
        contents.extend_from_slice(frame);
    }

    let mut file = tempfile::Builder::new().suffix(".pcap").tempfile().unwrap();
    file.write_all(&contents).unwrap();
    file.flush().unwrap();
    file
}

/// Timestamp of the first record written by `pcap_file`
pub const PCAP_EPOCH: u32 = 1_700_000_000;
