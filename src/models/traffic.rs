//! Aggregate traffic records
//!
//! One `UserEndpoint` per local address, owning its host and application
//! records directly. Collections keep first-seen order so presentation
//! tables stay stable between snapshots.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::Ipv4Addr;

use crate::models::packet::PacketKind;

/// Insertion-ordered map with stable indices; entries are never removed
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<V>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Copy, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, V> OrderedMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.index.get(key).map(|&i| &mut self.entries[i])
    }

    /// Returns the entry for `key`, inserting `make()` first if absent.
    /// The flag is true when the entry was just created.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> (&mut V, bool) {
        match self.index.get(&key) {
            Some(&i) => (&mut self.entries[i], false),
            None => {
                let i = self.entries.len();
                self.entries.push(make());
                self.index.insert(key, i);
                (&mut self.entries[i], true)
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn to_vec(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.entries.clone()
    }
}

/// Packet counts by protocol category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolCounts {
    pub arp: u64,
    pub rarp: u64,
    pub icmp: u64,
    pub igmp: u64,
    pub tcp: u64,
    pub udp: u64,
    pub other: u64,
    pub total: u64,
}

impl ProtocolCounts {
    pub fn record(&mut self, kind: PacketKind) {
        self.total += 1;
        match kind {
            PacketKind::Arp => self.arp += 1,
            PacketKind::Rarp => self.rarp += 1,
            PacketKind::Icmp => self.icmp += 1,
            PacketKind::Igmp => self.igmp += 1,
            PacketKind::Tcp => self.tcp += 1,
            PacketKind::Udp => self.udp += 1,
            PacketKind::OtherIp(_) | PacketKind::Other(_) => self.other += 1,
        }
    }

    /// ARP, RARP, ICMP, IGMP, TCP, UDP, other, total
    pub fn as_array(&self) -> [u64; 8] {
        [
            self.arp, self.rarp, self.icmp, self.igmp, self.tcp, self.udp, self.other, self.total,
        ]
    }
}

/// Per-user packet counts split by direction; `all` is the sum of both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalCounts {
    pub all: ProtocolCounts,
    pub inbound: ProtocolCounts,
    pub outbound: ProtocolCounts,
}

/// Current value plus the value at the previous snapshot tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sampled {
    pub current: u64,
    pub previous: u64,
}

impl Sampled {
    pub fn add(&mut self, amount: u64) {
        self.current += amount;
    }

    pub fn delta(&self) -> u64 {
        self.current.saturating_sub(self.previous)
    }

    /// Delta since the last sample in KiB, then rolls the sample forward
    pub fn take_kib(&mut self) -> f64 {
        let kib = self.delta() as f64 / 1024.0;
        self.previous = self.current;
        kib
    }
}

/// Global packet and byte counters for the whole capture
#[derive(Debug, Clone, Default)]
pub struct NetCounters {
    pub packets: ProtocolCounts,
    pub previous_total: u64,
    pub upload: Sampled,
    pub download: Sampled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub address: Ipv4Addr,
    pub name: String,
    /// Remote port of the most recent packet exchanged with this host
    pub port: Option<u16>,
    pub app_name: String,
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub first_seen: DateTime<Local>,
    pub last_seen: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    pub port: u16,
    pub name: String,
    pub upload_bytes: u64,
    pub download_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UserEndpoint {
    pub address: Ipv4Addr,
    pub name: String,
    pub first_seen: DateTime<Local>,
    pub upload: Sampled,
    pub download: Sampled,
    pub upload_kib_per_sec: f64,
    pub download_kib_per_sec: f64,
    pub hosts: OrderedMap<Ipv4Addr, HostRecord>,
    pub apps: OrderedMap<u16, AppRecord>,
    pub counts: DirectionalCounts,
}

impl UserEndpoint {
    pub fn new(address: Ipv4Addr, first_seen: DateTime<Local>) -> Self {
        Self {
            address,
            name: String::new(),
            first_seen,
            upload: Sampled::default(),
            download: Sampled::default(),
            upload_kib_per_sec: 0.0,
            download_kib_per_sec: 0.0,
            hosts: OrderedMap::default(),
            apps: OrderedMap::default(),
            counts: DirectionalCounts::default(),
        }
    }

    pub fn record_outbound(&mut self, kind: PacketKind) {
        self.counts.outbound.record(kind);
        self.counts.all.record(kind);
    }

    pub fn record_inbound(&mut self, kind: PacketKind) {
        self.counts.inbound.record(kind);
        self.counts.all.record(kind);
    }
}

/// Direction of multicast traffic as seen from the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MulticastDirection {
    /// The group is the destination
    Download,
    /// The group is the source
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastParticipant {
    pub address: Ipv4Addr,
    pub upload_bytes: u64,
    pub download_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastGroup {
    pub group: Ipv4Addr,
    pub participants: Vec<MulticastParticipant>,
}

impl MulticastGroup {
    pub fn new(group: Ipv4Addr) -> Self {
        Self {
            group,
            participants: Vec::new(),
        }
    }

    pub fn record(&mut self, participant: Ipv4Addr, length: u64, direction: MulticastDirection) {
        let position = self
            .participants
            .iter()
            .position(|p| p.address == participant);
        let entry = match position {
            Some(i) => &mut self.participants[i],
            None => {
                self.participants.push(MulticastParticipant {
                    address: participant,
                    upload_bytes: 0,
                    download_bytes: 0,
                });
                let last = self.participants.len() - 1;
                &mut self.participants[last]
            }
        };
        match direction {
            MulticastDirection::Download => entry.download_bytes += length,
            MulticastDirection::Upload => entry.upload_bytes += length,
        }
    }

    pub fn participant(&self, address: Ipv4Addr) -> Option<&MulticastParticipant> {
        self.participants.iter().find(|p| p.address == address)
    }
}
