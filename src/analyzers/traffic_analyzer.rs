// TrafficAnalyzer: attributes captured packets to local users
// Classifies each packet relative to the local network and keeps per-user,
// per-host, per-application and per-multicast-group byte and packet totals

use chrono::{DateTime, Local};
use log::debug;
use std::net::Ipv4Addr;

use crate::analyzers::network::{LocalNetwork, is_multicast};
use crate::analyzers::ports::PortTable;
use crate::models::traffic::OrderedMap;
use crate::models::{
    AppRecord, HostRecord, MonitorEvent, MulticastDirection, MulticastGroup, NetCounters,
    PacketEvent, Snapshot, UserEndpoint, UserSnapshot,
};

/// Which accounting branch a packet went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    Multicast,
    /// Both ends local; only global counters move
    IntraLan,
    Outbound,
    Inbound,
    /// Not IPv4, or neither end is local; only global counters move
    Unattributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

/// Aggregate state for one capture session
///
/// Single writer: `consume`, `snapshot` and the name-application methods all
/// take `&mut self`, so callers serialise them by construction.
///
/// # Example
///
/// ```rust,ignore
/// let mut analyzer = TrafficAnalyzer::new(network);
/// analyzer.start_session(PortTable::default());
/// analyzer.consume(&packet);
/// let snapshot = analyzer.snapshot();
/// ```
#[derive(Debug, Default)]
pub struct TrafficAnalyzer {
    network: LocalNetwork,
    ports: PortTable,
    counters: NetCounters,
    users: OrderedMap<Ipv4Addr, UserEndpoint>,
    multicast: OrderedMap<Ipv4Addr, MulticastGroup>,
    /// Events produced by `consume` and not yet collected
    notices: Vec<MonitorEvent>,
}

impl TrafficAnalyzer {
    pub fn new(network: LocalNetwork) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Replaces the local network; applies to packets consumed from now on
    pub fn configure(&mut self, network: LocalNetwork) {
        self.network = network;
    }

    pub fn network(&self) -> LocalNetwork {
        self.network
    }

    /// Drops all per-session state and installs a fresh port table
    pub fn start_session(&mut self, ports: PortTable) {
        self.ports = ports;
        self.counters = NetCounters::default();
        self.users.clear();
        self.multicast.clear();
        self.notices.clear();
    }

    pub fn consume(&mut self, event: &PacketEvent) -> TrafficClass {
        self.counters.packets.record(event.kind);

        if !event.kind.is_ipv4() {
            return TrafficClass::Unattributed;
        }

        let (source, dest) = (event.source_addr, event.dest_addr);
        let length = u64::from(event.length);

        let source_local = self.network.is_local(source);

        // a non-local multicast source wins over a multicast destination
        if !source_local && is_multicast(source) {
            self.record_multicast(source, dest, length, MulticastDirection::Upload);
            return TrafficClass::Multicast;
        }
        if is_multicast(dest) {
            self.record_multicast(dest, source, length, MulticastDirection::Download);
            return TrafficClass::Multicast;
        }

        match (source_local, self.network.is_local(dest)) {
            (true, true) => TrafficClass::IntraLan,
            (true, false) => {
                self.account(event, source, dest, event.dest_port, Direction::Outbound);
                TrafficClass::Outbound
            }
            (false, true) => {
                self.account(event, dest, source, event.source_port, Direction::Inbound);
                TrafficClass::Inbound
            }
            (false, false) => TrafficClass::Unattributed,
        }
    }

    fn record_multicast(
        &mut self,
        group: Ipv4Addr,
        participant: Ipv4Addr,
        length: u64,
        direction: MulticastDirection,
    ) {
        let (entry, created) = self
            .multicast
            .get_or_insert_with(group, || MulticastGroup::new(group));
        if created {
            debug!("New multicast group {group}");
        }
        entry.record(participant, length, direction);
    }

    fn account(
        &mut self,
        event: &PacketEvent,
        user_addr: Ipv4Addr,
        remote_addr: Ipv4Addr,
        remote_port: Option<u16>,
        direction: Direction,
    ) {
        let seen = event.timestamp.to_local();
        let length = u64::from(event.length);
        let app_name = remote_port
            .map(|port| self.ports.lookup(event.kind.transport(), port))
            .unwrap_or("")
            .to_string();

        let (user, created) = self
            .users
            .get_or_insert_with(user_addr, || UserEndpoint::new(user_addr, seen));
        if created {
            debug!("New user {user_addr}");
            self.notices.push(MonitorEvent::NewUser {
                address: user_addr,
                first_seen: seen,
            });
        }

        match direction {
            Direction::Outbound => {
                user.upload.add(length);
                self.counters.upload.add(length);
            }
            Direction::Inbound => {
                user.download.add(length);
                self.counters.download.add(length);
            }
        }

        let (host, created) = user
            .hosts
            .get_or_insert_with(remote_addr, || new_host(remote_addr, seen));
        host.port = remote_port;
        host.app_name.clone_from(&app_name);
        host.last_seen = seen;
        match direction {
            Direction::Outbound => host.upload_bytes += length,
            Direction::Inbound => host.download_bytes += length,
        }
        if created {
            debug!("New host {remote_addr} for user {user_addr}");
            self.notices.push(MonitorEvent::NewUserHost {
                user: user_addr,
                host: host.clone(),
            });
        }

        if let Some(port) = remote_port.filter(|&port| port != 0) {
            let (app, created) = user.apps.get_or_insert_with(port, || AppRecord {
                port,
                name: app_name,
                upload_bytes: 0,
                download_bytes: 0,
            });
            match direction {
                Direction::Outbound => app.upload_bytes += length,
                Direction::Inbound => app.download_bytes += length,
            }
            if created {
                self.notices.push(MonitorEvent::NewUserApp {
                    user: user_addr,
                    app: app.clone(),
                });
            }
        }

        match direction {
            Direction::Outbound => user.record_outbound(event.kind),
            Direction::Inbound => user.record_inbound(event.kind),
        }
    }

    /// Takes the new-user/host/app events produced since the last call
    pub fn take_notices(&mut self) -> Vec<MonitorEvent> {
        std::mem::take(&mut self.notices)
    }

    /// Builds the periodic bundle and rolls every speed sample forward
    pub fn snapshot(&mut self) -> Snapshot {
        let total = self.counters.packets.total;
        let packets_per_second = total.saturating_sub(self.counters.previous_total);
        self.counters.previous_total = total;

        let upload_kib_per_sec = self.counters.upload.take_kib();
        let download_kib_per_sec = self.counters.download.take_kib();

        let users = self
            .users
            .iter_mut()
            .map(|user| {
                user.upload_kib_per_sec = user.upload.take_kib();
                user.download_kib_per_sec = user.download.take_kib();
                UserSnapshot {
                    address: user.address,
                    name: user.name.clone(),
                    upload_bytes: user.upload.current,
                    download_bytes: user.download.current,
                    upload_kib_per_sec: user.upload_kib_per_sec,
                    download_kib_per_sec: user.download_kib_per_sec,
                    counts: user.counts,
                    hosts: user.hosts.to_vec(),
                    apps: user.apps.to_vec(),
                }
            })
            .collect();

        Snapshot {
            taken_at: Local::now(),
            packets_per_second,
            packets: self.counters.packets,
            upload_bytes: self.counters.upload.current,
            download_bytes: self.counters.download.current,
            upload_kib_per_sec,
            download_kib_per_sec,
            users,
            multicast: self.multicast.to_vec(),
        }
    }

    /// Records a resolved user name; true when it is worth announcing,
    /// i.e. the user still exists and the name is not just the dotted address
    pub fn apply_user_name(&mut self, address: Ipv4Addr, name: &str) -> bool {
        let Some(user) = self.users.get_mut(&address) else {
            return false;
        };
        if name.is_empty() || name == address.to_string() {
            return false;
        }
        user.name = name.to_string();
        true
    }

    /// Sets the name on every host record with this address; returns how many
    pub fn apply_host_name(&mut self, address: Ipv4Addr, name: &str) -> usize {
        let mut updated = 0;
        for user in self.users.iter_mut() {
            if let Some(host) = user.hosts.get_mut(&address) {
                host.name = name.to_string();
                updated += 1;
            }
        }
        updated
    }

    pub fn counters(&self) -> &NetCounters {
        &self.counters
    }

    pub fn users(&self) -> impl Iterator<Item = &UserEndpoint> {
        self.users.iter()
    }

    pub fn user(&self, address: Ipv4Addr) -> Option<&UserEndpoint> {
        self.users.get(&address)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn multicast_groups(&self) -> impl Iterator<Item = &MulticastGroup> {
        self.multicast.iter()
    }

    pub fn multicast_group(&self, group: Ipv4Addr) -> Option<&MulticastGroup> {
        self.multicast.get(&group)
    }
}

fn new_host(address: Ipv4Addr, seen: DateTime<Local>) -> HostRecord {
    HostRecord {
        address,
        name: String::new(),
        port: None,
        app_name: String::new(),
        upload_bytes: 0,
        download_bytes: 0,
        first_seen: seen,
        last_seen: seen,
    }
}
