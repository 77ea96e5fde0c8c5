//! Local network membership
//!
//! Addresses are compared bit by bit in wire order: octet one first, least
//! significant bit of each octet first. Scanning stops at the first mask bit
//! that is clear and everything after it counts as host bits. For ordinary
//! prefix masks (255.255.255.0, 255.255.0.0, ...) this is exactly the usual
//! `(addr ^ local) & mask == 0` test. Non-contiguous masks keep the scan
//! semantics rather than being normalised.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNetwork {
    pub mask: Ipv4Addr,
    pub address: Ipv4Addr,
}

impl Default for LocalNetwork {
    /// Class C mask with no interface address, used when a device reports none
    fn default() -> Self {
        Self {
            mask: Ipv4Addr::new(255, 255, 255, 0),
            address: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl LocalNetwork {
    pub fn new(mask: Ipv4Addr, address: Ipv4Addr) -> Self {
        Self { mask, address }
    }

    pub fn is_local(&self, candidate: Ipv4Addr) -> bool {
        let mask = wire_bits(self.mask);
        let local = wire_bits(self.address);
        let candidate = wire_bits(candidate);

        for bit in 0..32 {
            let selector = 1u32 << bit;
            if mask & selector == 0 {
                return true;
            }
            if (candidate ^ local) & selector != 0 {
                return false;
            }
        }
        true
    }
}

/// 224.0.0.0/4 (RFC 3171)
pub fn is_multicast(address: Ipv4Addr) -> bool {
    (224..=239).contains(&address.octets()[0])
}

/// Address bits in the order they appear on the wire
fn wire_bits(address: Ipv4Addr) -> u32 {
    u32::from_le_bytes(address.octets())
}

impl fmt::Display for LocalNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.mask)
    }
}

impl FromStr for LocalNetwork {
    type Err = String;

    /// Accepts `ADDR/MASK` (dotted mask) or `ADDR/PREFIX`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, mask) = s
            .split_once('/')
            .ok_or_else(|| format!("expected ADDR/MASK, got \"{s}\""))?;
        let address: Ipv4Addr = address
            .trim()
            .parse()
            .map_err(|e| format!("invalid address \"{address}\": {e}"))?;
        let mask = mask.trim();
        let mask = match mask.parse::<u8>() {
            Ok(prefix) if prefix <= 32 => prefix_to_mask(prefix),
            Ok(prefix) => return Err(format!("prefix length {prefix} is larger than 32")),
            Err(_) => mask
                .parse::<Ipv4Addr>()
                .map_err(|e| format!("invalid mask \"{mask}\": {e}"))?,
        };
        Ok(Self::new(mask, address))
    }
}

fn prefix_to_mask(prefix: u8) -> Ipv4Addr {
    let bits = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    Ipv4Addr::from(bits)
}
