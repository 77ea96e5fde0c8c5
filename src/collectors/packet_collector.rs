use log::{debug, error, info, warn};
use pcap::{Activated, Capture};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::UnboundedSender;

use crate::collectors::dissector::dissect;
use crate::collectors::packet_source::{PacketSource, PcapSource, ReadOutcome};
use crate::error::CaptureError;
use crate::models::{CaptureEvent, EndReason, InfoMessage};

const MESSAGE_TITLE: &str = "Capture thread";

/// Count-based stop condition for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLimit {
    Unbounded,
    Packets(u64),
}

impl From<u64> for PacketLimit {
    /// Zero means no limit
    fn from(value: u64) -> Self {
        if value == 0 {
            PacketLimit::Unbounded
        } else {
            PacketLimit::Packets(value)
        }
    }
}

impl PacketLimit {
    fn reached(&self, captured: u64) -> bool {
        matches!(self, PacketLimit::Packets(limit) if captured >= *limit)
    }
}

/// Parameters for opening a live capture
#[derive(Debug, Clone)]
pub struct CaptureParams {
    pub device: String,
    pub promiscuous: bool,
    pub snap_length: i32,
    pub read_timeout_ms: i32,
    /// pcap filter expression; empty accepts everything
    pub filter: String,
    pub packet_limit: PacketLimit,
}

/// A running read loop and the means to stop it
#[derive(Debug)]
pub struct CaptureSession {
    source_name: String,
    packet_limit: PacketLimit,
    abort: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl CaptureSession {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn packet_limit(&self) -> PacketLimit {
        self.packet_limit
    }
}

/// Owns the capture handle and the dedicated read-loop thread
///
/// Every lifecycle transition and every dissected frame is published on the
/// `CaptureEvent` channel, in order, from the loop thread.
pub struct CaptureEngine {
    events: UnboundedSender<CaptureEvent>,
    session: Option<CaptureSession>,
}

impl CaptureEngine {
    pub fn new(events: UnboundedSender<CaptureEvent>) -> Self {
        Self {
            events,
            session: None,
        }
    }

    /// Opens `params.device`, installs the filter and starts the read loop
    pub fn start(&mut self, params: &CaptureParams) -> Result<(), CaptureError> {
        self.ensure_idle()?;

        info!(
            "Opening {} (promiscuous: {}, snaplen: {}, timeout: {}ms)",
            params.device, params.promiscuous, params.snap_length, params.read_timeout_ms
        );

        let capture = Capture::from_device(params.device.as_str())
            .and_then(|c| {
                c.promisc(params.promiscuous)
                    .snaplen(params.snap_length)
                    .timeout(params.read_timeout_ms)
                    .open()
            })
            .map_err(|source| CaptureError::DeviceOpen {
                device: params.device.clone(),
                source,
            });
        let mut capture = self.report(capture)?;

        let installed = install_filter(&mut capture, &params.filter);
        self.report(installed)?;

        self.start_with_source(&params.device, PcapSource::new(capture), params.packet_limit)
    }

    /// Replays a saved capture file through the same loop
    pub fn start_offline(
        &mut self,
        path: &Path,
        filter: &str,
        packet_limit: PacketLimit,
    ) -> Result<(), CaptureError> {
        self.ensure_idle()?;

        info!("Opening capture file {}", path.display());

        let capture = Capture::from_file(path).map_err(|source| CaptureError::FileOpen {
            path: path.to_path_buf(),
            source,
        });
        let mut capture = self.report(capture)?;

        let installed = install_filter(&mut capture, filter);
        self.report(installed)?;

        let name = path.display().to_string();
        self.start_with_source(&name, PcapSource::new(capture), packet_limit)
    }

    /// Starts the read loop over an already-prepared source
    pub fn start_with_source<S: PacketSource + 'static>(
        &mut self,
        source_name: &str,
        source: S,
        packet_limit: PacketLimit,
    ) -> Result<(), CaptureError> {
        self.ensure_idle()?;

        let abort = Arc::new(AtomicBool::new(false));
        let loop_abort = Arc::clone(&abort);
        let events = self.events.clone();

        let spawned = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || read_loop(source, packet_limit, &loop_abort, &events))
            .map_err(CaptureError::from);
        let handle = self.report(spawned)?;

        info!("Capture started on {source_name} (limit: {packet_limit:?})");
        self.session = Some(CaptureSession {
            source_name: source_name.to_string(),
            packet_limit,
            abort,
            handle,
        });
        Ok(())
    }

    /// Signals the loop to stop and waits for the thread to exit
    ///
    /// Publishes `Stopped` once per session; returns false if nothing was running.
    pub fn stop(&mut self) -> bool {
        let Some(captured) = self.shutdown() else {
            return false;
        };
        info!("Capture stopped after {captured} packets");
        if self.events.send(CaptureEvent::Stopped).is_err() {
            debug!("Capture event receiver dropped before stop notification");
        }
        true
    }

    /// True while a session exists and its loop thread is still reading
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    fn shutdown(&mut self) -> Option<u64> {
        let session = self.session.take()?;
        session.abort.store(true, Ordering::SeqCst);
        match session.handle.join() {
            Ok(captured) => Some(captured),
            Err(_) => {
                error!("Capture thread for {} panicked", session.source_name);
                Some(0)
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        Ok(())
    }

    /// Publishes a critical message for a failed start step
    fn report<T>(&self, result: Result<T, CaptureError>) -> Result<T, CaptureError> {
        result.inspect_err(|e| {
            error!("{e}");
            let _ = self
                .events
                .send(CaptureEvent::Message(InfoMessage::critical(MESSAGE_TITLE, e.to_string())));
        })
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn install_filter<T: Activated + ?Sized>(
    capture: &mut Capture<T>,
    filter: &str,
) -> Result<(), CaptureError> {
    if filter.trim().is_empty() {
        return Ok(());
    }

    capture
        .compile(filter, true)
        .map_err(|source| CaptureError::FilterCompile {
            filter: filter.to_string(),
            source,
        })?;
    capture
        .filter(filter, true)
        .map_err(|source| CaptureError::FilterInstall {
            filter: filter.to_string(),
            source,
        })?;

    info!("Installed capture filter: {filter}");
    Ok(())
}

/// Blocking read loop; returns the number of frames dissected
fn read_loop<S: PacketSource>(
    mut source: S,
    packet_limit: PacketLimit,
    abort: &AtomicBool,
    events: &UnboundedSender<CaptureEvent>,
) -> u64 {
    let mut captured = 0u64;

    if events.send(CaptureEvent::Started).is_err() {
        warn!("Capture event receiver dropped before the loop started");
        return captured;
    }

    while !abort.load(Ordering::SeqCst) {
        let packet = match source.next_frame() {
            ReadOutcome::Timeout => continue,
            ReadOutcome::Frame(frame) => dissect(&frame),
            ReadOutcome::Error(message) => {
                error!("Error while reading packet: {message}");
                let body = format!("Error while reading packet: \"{message}\"");
                let info = InfoMessage::critical(MESSAGE_TITLE, body);
                let _ = events.send(CaptureEvent::Message(info));
                let _ = events.send(CaptureEvent::LoopEnded(EndReason::ReadError(message)));
                return captured;
            }
            ReadOutcome::EndOfStream => {
                info!("Capture source exhausted after {captured} packets");
                let _ = events.send(CaptureEvent::LoopEnded(EndReason::EndOfStream));
                return captured;
            }
        };

        captured += 1;
        if events.send(CaptureEvent::Packet(packet)).is_err() {
            warn!("Capture event receiver dropped, ending read loop");
            return captured;
        }

        if packet_limit.reached(captured) {
            info!("Packet limit of {captured} reached");
            let _ = events.send(CaptureEvent::LoopEnded(EndReason::PacketLimit));
            return captured;
        }
    }

    debug!("Read loop aborted after {captured} packets");
    captured
}
