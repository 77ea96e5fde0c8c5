//! Port number to application name table
//!
//! Loaded from a plain text file with one `PROTO PORT=Description` entry per
//! line, e.g. `TCP 443=HTTP protocol over TLS/SSL`.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

use crate::models::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub transport: Option<Transport>,
    pub port: u16,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct PortTable {
    exact: HashMap<(Transport, u16), usize>,
    by_port: HashMap<u16, usize>,
    entries: Vec<PortEntry>,
}

impl PortTable {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::parse(&contents);
        debug!("Loaded {} port names from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse(contents: &str) -> Self {
        let mut table = Self::default();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Some(entry) => table.insert(entry),
                None => warn!("Skipping malformed port entry on line {}: {line}", number + 1),
            }
        }
        table
    }

    pub fn insert(&mut self, entry: PortEntry) {
        let i = self.entries.len();
        if let Some(transport) = entry.transport {
            self.exact.entry((transport, entry.port)).or_insert(i);
        }
        self.by_port.entry(entry.port).or_insert(i);
        self.entries.push(entry);
    }

    /// Prefers an entry for the same transport, then any entry for the port.
    /// Returns an empty string when the port is unknown.
    pub fn lookup(&self, transport: Option<Transport>, port: u16) -> &str {
        transport
            .and_then(|t| self.exact.get(&(t, port)))
            .or_else(|| self.by_port.get(&port))
            .map(|&i| self.entries[i].description.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Option<PortEntry> {
    let (key, description) = line.split_once('=')?;
    let mut key = key.split_whitespace();
    let first = key.next()?;
    let (transport, port) = match key.next() {
        Some(port) => (parse_transport(first), port),
        None => (None, first),
    };
    let port = port.parse::<u16>().ok()?;
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");

    Some(PortEntry {
        transport,
        port,
        description,
    })
}

fn parse_transport(token: &str) -> Option<Transport> {
    match token.to_ascii_uppercase().as_str() {
        "TCP" => Some(Transport::Tcp),
        "UDP" => Some(Transport::Udp),
        _ => None,
    }
}
