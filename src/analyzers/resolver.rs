use async_trait::async_trait;
use log::trace;
use std::net::{IpAddr, Ipv4Addr};

/// Reverse name lookup for an address
///
/// `None` covers every failure; callers never distinguish why a lookup failed.
#[async_trait]
pub trait NameResolver: Send + Sync + 'static {
    async fn reverse_lookup(&self, address: Ipv4Addr) -> Option<String>;
}

/// Uses the operating system resolver (`getnameinfo`) on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl NameResolver for SystemResolver {
    async fn reverse_lookup(&self, address: Ipv4Addr) -> Option<String> {
        let result =
            tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(address)))
                .await
                .ok()?;
        match result {
            Ok(name) => Some(name),
            Err(e) => {
                trace!("Reverse lookup for {address} failed: {e}");
                None
            }
        }
    }
}

/// Resolver that never produces a name
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

#[async_trait]
impl NameResolver for NoResolver {
    async fn reverse_lookup(&self, _address: Ipv4Addr) -> Option<String> {
        None
    }
}
