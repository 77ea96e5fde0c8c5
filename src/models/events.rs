//! Events crossing component boundaries
//!
//! `CaptureEvent` flows from the capture thread to the aggregation task over
//! a single ordered channel. `MonitorEvent` is what the aggregation task
//! publishes to whatever presents the data.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::models::packet::PacketEvent;
use crate::models::traffic::{
    AppRecord, DirectionalCounts, HostRecord, MulticastGroup, ProtocolCounts,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

impl InfoMessage {
    pub fn new(severity: Severity, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, body)
    }

    pub fn critical(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Critical, title, body)
    }
}

impl fmt::Display for InfoMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.title, self.body)
    }
}

/// Why the read loop exited on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    PacketLimit,
    ReadError(String),
    /// Offline capture ran out of frames
    EndOfStream,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    Packet(PacketEvent),
    LoopEnded(EndReason),
    Stopped,
    Message(InfoMessage),
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub address: Ipv4Addr,
    pub name: String,
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub upload_kib_per_sec: f64,
    pub download_kib_per_sec: f64,
    pub counts: DirectionalCounts,
    pub hosts: Vec<HostRecord>,
    pub apps: Vec<AppRecord>,
}

/// The once-per-second bundle of aggregate state
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Local>,
    pub packets_per_second: u64,
    pub packets: ProtocolCounts,
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub upload_kib_per_sec: f64,
    pub download_kib_per_sec: f64,
    /// Indexed in the order users were first seen
    pub users: Vec<UserSnapshot>,
    pub multicast: Vec<MulticastGroup>,
}

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Message(InfoMessage),
    CaptureStarted,
    CaptureStopped,
    CaptureEnded(EndReason),
    Packet(PacketEvent),
    NewUser {
        address: Ipv4Addr,
        first_seen: DateTime<Local>,
    },
    NewUserName {
        address: Ipv4Addr,
        name: String,
    },
    NewUserHost {
        user: Ipv4Addr,
        host: HostRecord,
    },
    NewUserApp {
        user: Ipv4Addr,
        app: AppRecord,
    },
    NewHostName {
        address: Ipv4Addr,
        name: String,
    },
    Snapshot(Box<Snapshot>),
}
