pub mod dissector;
pub mod packet_collector;
pub mod packet_source;

pub use packet_collector::{CaptureEngine, CaptureParams, CaptureSession, PacketLimit};
pub use packet_source::{
    CapturedFrame, PacketSource, PcapSource, ReadOutcome, ReplaySource, ReplayStep,
};
