//! The read primitive behind the capture loop
//!
//! `PacketSource` is the seam between the loop and libpcap. The loop only
//! cares about the four outcomes of a read, so live devices, saved capture
//! files and in-memory replays all look the same to it.

use log::debug;
use pcap::{Activated, Capture};
use std::collections::VecDeque;

use crate::models::CaptureTimestamp;

/// A frame borrowed from the source's buffer, valid until the next read
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    pub timestamp: CaptureTimestamp,
    /// Length on the wire
    pub length: u32,
    pub data: &'a [u8],
}

#[derive(Debug)]
pub enum ReadOutcome<'a> {
    Frame(CapturedFrame<'a>),
    Timeout,
    Error(String),
    EndOfStream,
}

pub trait PacketSource: Send {
    fn next_frame(&mut self) -> ReadOutcome<'_>;
}

/// Live or offline libpcap handle
pub struct PcapSource<T: Activated + ?Sized> {
    capture: Capture<T>,
}

impl<T: Activated + ?Sized> PcapSource<T> {
    pub fn new(capture: Capture<T>) -> Self {
        Self { capture }
    }
}

impl<T: Activated + ?Sized> PacketSource for PcapSource<T>
where
    Capture<T>: Send,
{
    fn next_frame(&mut self) -> ReadOutcome<'_> {
        match self.capture.next_packet() {
            Ok(packet) => ReadOutcome::Frame(CapturedFrame {
                timestamp: CaptureTimestamp::new(
                    packet.header.ts.tv_sec as i64,
                    packet.header.ts.tv_usec as i64,
                ),
                length: packet.header.len,
                data: packet.data,
            }),
            Err(pcap::Error::TimeoutExpired) => ReadOutcome::Timeout,
            Err(pcap::Error::NoMorePackets) => ReadOutcome::EndOfStream,
            Err(e) => {
                debug!("pcap read failed: {e}");
                ReadOutcome::Error(e.to_string())
            }
        }
    }
}

/// One scripted read result for `ReplaySource`
#[derive(Debug, Clone)]
pub enum ReplayStep {
    Frame {
        timestamp: CaptureTimestamp,
        data: Vec<u8>,
    },
    Timeout,
    Error(String),
}

/// In-memory source that plays back a fixed script, then reports end of stream
#[derive(Debug, Default)]
pub struct ReplaySource {
    steps: VecDeque<ReplayStep>,
    current: Vec<u8>,
    reads: usize,
}

impl ReplaySource {
    pub fn new(steps: impl IntoIterator<Item = ReplayStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            current: Vec::new(),
            reads: 0,
        }
    }

    /// Replays raw frames back to back, one second apart
    pub fn from_frames(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self::new(frames.into_iter().enumerate().map(|(i, data)| ReplayStep::Frame {
            timestamp: CaptureTimestamp::new(i as i64, 0),
            data,
        }))
    }

    /// Number of times `next_frame` has been called
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl PacketSource for ReplaySource {
    fn next_frame(&mut self) -> ReadOutcome<'_> {
        self.reads += 1;
        match self.steps.pop_front() {
            Some(ReplayStep::Frame { timestamp, data }) => {
                self.current = data;
                ReadOutcome::Frame(CapturedFrame {
                    timestamp,
                    length: self.current.len() as u32,
                    data: &self.current,
                })
            }
            Some(ReplayStep::Timeout) => ReadOutcome::Timeout,
            Some(ReplayStep::Error(message)) => ReadOutcome::Error(message),
            None => ReadOutcome::EndOfStream,
        }
    }
}
