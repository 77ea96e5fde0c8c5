//! Protocol constants and message tables
//!
//! Header layouts themselves come from `pnet::packet`; this module holds the
//! numeric identifiers the rest of the crate dispatches on, plus the lookup
//! tables that turn ICMP/IGMP type codes, ARP operations and TCP flag bits
//! into the human-readable info strings shown next to each packet.

pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_RARP: u16 = 0x8035;

pub const IP_PROTO_ICMP: u8 = 1;
pub const IP_PROTO_IGMP: u8 = 2;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

pub const UNKNOWN_ICMP_MESSAGE: &str = "unknown ICMP message type";
pub const UNKNOWN_IGMP_MESSAGE: &str = "unknown IGMP message type";
pub const PROTOCOL_NOT_SUPPORTED: &str = "protocol not supported";

/// Known ICMP message types (RFC 792 and friends)
pub const ICMP_MESSAGES: [(u8, &str); 16] = [
    (0, "Echo Reply"),
    (3, "Destination Unreachable"),
    (4, "Source Quench"),
    (5, "Redirect Message"),
    (6, "Alternate Host Address"),
    (8, "Echo Request"),
    (9, "Router Advertisement"),
    (10, "Router Selection"),
    (11, "Time Exceeded"),
    (12, "Parameter Problem"),
    (13, "Timestamp Request"),
    (14, "Timestamp Reply"),
    (15, "Information Request"),
    (16, "Information Reply"),
    (17, "Address Mask Request"),
    (18, "Address Mask Reply"),
];

/// Known IGMP message types
pub const IGMP_MESSAGES: [(u8, &str); 8] = [
    (0x11, "Membership Query"),
    (0x12, "IGMPv1 Membership Report"),
    (0x16, "IGMPv2 Membership Report"),
    (0x17, "Leave Group"),
    (0x22, "IGMPv3 Membership Report"),
    (0x24, "Multicast Router Advertisement"),
    (0x25, "Multicast Router Solicitation"),
    (0x26, "Multicast Router Termination"),
];

/// TCP flag names, indexed by bit position in the flags byte (LSB first)
pub const TCP_FLAGS: [&str; 8] = ["FIN", "SYN", "RST", "PSH", "ACK", "URG", "ECE", "CWR"];

pub fn icmp_message(icmp_type: u8) -> &'static str {
    ICMP_MESSAGES
        .iter()
        .find(|(code, _)| *code == icmp_type)
        .map(|(_, message)| *message)
        .unwrap_or(UNKNOWN_ICMP_MESSAGE)
}

pub fn igmp_message(igmp_type: u8) -> &'static str {
    IGMP_MESSAGES
        .iter()
        .find(|(code, _)| *code == igmp_type)
        .map(|(_, message)| *message)
        .unwrap_or(UNKNOWN_IGMP_MESSAGE)
}

/// Space-joined flag tokens for the set bits, in FIN..CWR order
pub fn tcp_flags_info(flags: u8) -> String {
    TCP_FLAGS
        .iter()
        .enumerate()
        .filter(|(bit, _)| flags & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Info text for an ARP operation code; only request and response are named
pub fn arp_operation_info(operation: u16) -> &'static str {
    match operation {
        1 => "ARP request",
        2 => "ARP response",
        _ => "",
    }
}

/// Info text for a RARP operation code (RFC 903 and the dynamic RARP extension)
pub fn rarp_operation_info(operation: u16) -> &'static str {
    match operation {
        3 => "RARP request",
        4 => "RARP response",
        5 => "Dynamic RARP request",
        6 => "Dynamic RARP reply",
        _ => "",
    }
}
