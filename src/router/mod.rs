//! Routing: Direct vs Chained
//!
//! Classifies each target against the geo range store and produces a live
//! connection either straight to the target or through the upstream proxy.

mod chain;

pub use chain::connect_upstream;

use crate::config::Config;
use crate::geoip::GeoRangeStore;
use anyhow::{Context, Result};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;

/// Routing outcome for one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Connect straight to the target
    Direct,
    /// Relay through the configured upstream proxy
    Chained,
}

/// Split a `host:port` target into host and optional port.
///
/// Handles bracketed IPv6 (`[::1]:80`). A bare IPv6 address or a target
/// without a parseable port yields the whole string as host.
pub(crate) fn split_host_port(target: &str) -> (&str, Option<u16>) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, port_part)) = rest.split_once(']') {
            let port = port_part.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }
    if let Some((host, port_part)) = target.rsplit_once(':') {
        if !host.contains(':') {
            if let Ok(port) = port_part.parse() {
                return (host, Some(port));
            }
        }
    }
    (target, None)
}

/// Target classifier and dialer
#[derive(Debug, Clone)]
pub struct Router {
    store: Arc<GeoRangeStore>,
}

impl Router {
    /// Create a router over a shared range store.
    pub fn new(store: Arc<GeoRangeStore>) -> Self {
        Router { store }
    }

    /// The underlying range store.
    pub fn store(&self) -> &Arc<GeoRangeStore> {
        &self.store
    }

    /// Classify a `host:port` target as Direct or Chained.
    ///
    /// Literal addresses query the store; domain names are resolved and
    /// count as Direct iff any resolved address is in a loaded range.
    /// Resolution failure fails toward the upstream proxy, not toward the
    /// open internet.
    pub async fn classify(&self, target: &str) -> Route {
        let (host, _) = split_host_port(target);

        if let Ok(ip) = host.parse::<IpAddr>() {
            return if self.store.contains(ip) {
                Route::Direct
            } else {
                Route::Chained
            };
        }

        match tokio::net::lookup_host((host, 0)).await {
            Ok(mut addrs) => {
                if addrs.any(|addr| self.store.contains(addr.ip())) {
                    Route::Direct
                } else {
                    Route::Chained
                }
            }
            Err(e) => {
                debug!("DNS lookup failed for {}: {}", host, e);
                Route::Chained
            }
        }
    }

    /// Produce a live connection to `target`, direct or chained.
    ///
    /// Failures are returned to the caller for a protocol-appropriate
    /// failure reply; they are never fatal beyond the one connection.
    pub async fn dial(&self, target: &str, cfg: &Config) -> Result<TcpStream> {
        match self.classify(target).await {
            Route::Direct => {
                debug!("dial {} -> direct", target);
                TcpStream::connect(target)
                    .await
                    .with_context(|| format!("Failed to connect to {}", target))
            }
            Route::Chained => {
                debug!("dial {} -> chained", target);
                let (host, port) = split_host_port(target);
                let port = port
                    .with_context(|| format!("Target {} has no valid port", target))?;
                connect_upstream(cfg, host, port).await
            }
        }
    }
}
