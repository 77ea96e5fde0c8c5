//! lan-watcher: LAN traffic monitoring
//!
//! The capture engine (`collectors`) turns frames into `PacketEvent`s on a
//! dedicated thread; the aggregation engine (`analyzers`) attributes them to
//! local users and publishes `MonitorEvent`s with a snapshot every second.

pub mod analyzers;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod models;
