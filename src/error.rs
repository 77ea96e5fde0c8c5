use std::path::PathBuf;
use thiserror::Error;

/// Failures that prevent a capture session from starting
///
/// The display text carries the libpcap message so it can be shown as-is.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("a capture session is already running")]
    AlreadyRunning,

    #[error("unable to open network device {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: pcap::Error,
    },

    #[error("unable to open capture file {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },

    #[error("unable to compile the packet filter \"{filter}\": {source}")]
    FilterCompile {
        filter: String,
        #[source]
        source: pcap::Error,
    },

    #[error("error setting the packet filter \"{filter}\": {source}")]
    FilterInstall {
        filter: String,
        #[source]
        source: pcap::Error,
    },

    #[error("unable to start the capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}
