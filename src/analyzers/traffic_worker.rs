// TrafficWorker: the aggregation task
// Owns the TrafficAnalyzer, consumes capture events in order, drives the
// one-second snapshot timer and folds reverse lookups back into the records

use log::{debug, info, warn};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::analyzers::network::LocalNetwork;
use crate::analyzers::ports::PortTable;
use crate::analyzers::resolver::NameResolver;
use crate::analyzers::traffic_analyzer::TrafficAnalyzer;
use crate::models::{CaptureEvent, InfoMessage, MonitorEvent};

pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

const PORTS_TITLE: &str = "Port names";

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Re-read at every session start
    pub ports_file: PathBuf,
    pub resolve_names: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            ports_file: PathBuf::from("ports.txt"),
            resolve_names: true,
        }
    }
}

#[derive(Debug)]
enum Resolution {
    User { address: Ipv4Addr, name: String },
    Host { address: Ipv4Addr, name: String },
}

pub struct TrafficWorker<R: NameResolver> {
    analyzer: TrafficAnalyzer,
    resolver: Arc<R>,
    options: WorkerOptions,
    events: UnboundedSender<MonitorEvent>,
    resolved_tx: UnboundedSender<Resolution>,
    resolved_rx: UnboundedReceiver<Resolution>,
}

impl<R: NameResolver> TrafficWorker<R> {
    pub fn new(resolver: R, options: WorkerOptions, events: UnboundedSender<MonitorEvent>) -> Self {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        Self {
            analyzer: TrafficAnalyzer::default(),
            resolver: Arc::new(resolver),
            options,
            events,
            resolved_tx,
            resolved_rx,
        }
    }

    /// Sets the local network used to attribute traffic to users
    pub fn configure(&mut self, network: LocalNetwork) -> &mut Self {
        self.analyzer.configure(network);
        self
    }

    /// Runs until every capture event sender is dropped and returns the
    /// final aggregate state
    pub async fn run(mut self, mut capture: UnboundedReceiver<CaptureEvent>) -> TrafficAnalyzer {
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                event = capture.recv() => {
                    let Some(event) = event else {
                        debug!("Capture channel closed, aggregation task exiting");
                        break;
                    };
                    self.handle_capture(event, &mut ticker).await;
                }
                Some(resolution) = self.resolved_rx.recv() => {
                    self.handle_resolution(resolution);
                }
                _ = next_tick(&mut ticker) => {
                    let snapshot = self.analyzer.snapshot();
                    self.publish(MonitorEvent::Snapshot(Box::new(snapshot)));
                }
            }
        }

        self.analyzer
    }

    async fn handle_capture(&mut self, event: CaptureEvent, ticker: &mut Option<Interval>) {
        match event {
            CaptureEvent::Started => {
                let ports = self.load_ports().await;
                self.analyzer.start_session(ports);
                let start = Instant::now() + SNAPSHOT_INTERVAL;
                let mut interval = interval_at(start, SNAPSHOT_INTERVAL);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *ticker = Some(interval);
                info!("Aggregation session started for {}", self.analyzer.network());
                self.publish(MonitorEvent::CaptureStarted);
            }
            CaptureEvent::Stopped => {
                *ticker = None;
                self.publish(MonitorEvent::CaptureStopped);
            }
            CaptureEvent::LoopEnded(reason) => {
                self.publish(MonitorEvent::CaptureEnded(reason));
            }
            CaptureEvent::Message(message) => {
                self.publish(MonitorEvent::Message(message));
            }
            CaptureEvent::Packet(packet) => {
                self.analyzer.consume(&packet);
                self.publish(MonitorEvent::Packet(packet));
                for notice in self.analyzer.take_notices() {
                    match &notice {
                        MonitorEvent::NewUser { address, .. } => self.lookup_user(*address),
                        MonitorEvent::NewUserHost { host, .. } => self.lookup_host(host.address),
                        _ => {}
                    }
                    self.publish(notice);
                }
            }
        }
    }

    async fn load_ports(&self) -> PortTable {
        let path = self.options.ports_file.clone();
        let loaded = tokio::task::spawn_blocking(move || PortTable::load(&path))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        match loaded {
            Ok(table) => table,
            Err(e) => {
                warn!("Port names file {}: {e}", self.options.ports_file.display());
                self.publish(MonitorEvent::Message(InfoMessage::warning(
                    PORTS_TITLE,
                    format!(
                        "Unable to open port numbers file: {e}. \
                         Users application names not available."
                    ),
                )));
                PortTable::default()
            }
        }
    }

    fn handle_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::User { address, name } => {
                if self.analyzer.apply_user_name(address, &name) {
                    self.publish(MonitorEvent::NewUserName { address, name });
                }
            }
            Resolution::Host { address, name } => {
                if self.analyzer.apply_host_name(address, &name) > 0 {
                    self.publish(MonitorEvent::NewHostName { address, name });
                }
            }
        }
    }

    fn lookup_user(&self, address: Ipv4Addr) {
        self.spawn_lookup(address, |address, name| Resolution::User { address, name });
    }

    fn lookup_host(&self, address: Ipv4Addr) {
        self.spawn_lookup(address, |address, name| Resolution::Host { address, name });
    }

    fn spawn_lookup<F>(&self, address: Ipv4Addr, wrap: F)
    where
        F: FnOnce(Ipv4Addr, String) -> Resolution + Send + 'static,
    {
        if !self.options.resolve_names {
            return;
        }
        let resolver = Arc::clone(&self.resolver);
        let results = self.resolved_tx.clone();
        tokio::spawn(async move {
            if let Some(name) = resolver.reverse_lookup(address).await {
                // the worker may already be gone
                let _ = results.send(wrap(address, name));
            }
        });
    }

    fn publish(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            debug!("Monitor event receiver dropped");
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
