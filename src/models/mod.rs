pub mod events;
pub mod packet;
pub mod protocols;
pub mod traffic;

pub use events::{
    CaptureEvent, EndReason, InfoMessage, MonitorEvent, Severity, Snapshot, UserSnapshot,
};
pub use packet::{CaptureTimestamp, PacketEvent, PacketKind, Transport};
pub use traffic::{
    AppRecord, DirectionalCounts, HostRecord, MulticastDirection, MulticastGroup,
    MulticastParticipant, NetCounters, ProtocolCounts, UserEndpoint,
};
