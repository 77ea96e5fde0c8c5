pub mod network;
pub mod ports;
pub mod resolver;
pub mod traffic_analyzer;
pub mod traffic_worker;

pub use network::{LocalNetwork, is_multicast};
pub use ports::{PortEntry, PortTable};
pub use resolver::{NameResolver, NoResolver, SystemResolver};
pub use traffic_analyzer::{TrafficAnalyzer, TrafficClass};
pub use traffic_worker::{SNAPSHOT_INTERVAL, TrafficWorker, WorkerOptions};
