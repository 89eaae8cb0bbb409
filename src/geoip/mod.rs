//! GeoIP range store
//!
//! Owns the authoritative address-range table. Reloads build a complete
//! replacement table off to the side and publish it with a single pointer
//! swap, so concurrent membership queries never observe a partially
//! rebuilt table.

mod range;
mod source;

pub use range::{Ipv4Range, Ipv6Range, RangeTable, LOCAL_NETWORK_RANGES};
pub use source::{is_remote_source, load_source, CACHE_FILE_NAME, CACHE_MAX_AGE};

use crate::error::ProxyError;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared, reloadable range store
///
/// All connection-handling tasks query one store; the lock is held only
/// long enough to clone or swap the `Arc`.
#[derive(Debug)]
pub struct GeoRangeStore {
    table: RwLock<Arc<RangeTable>>,
}

impl Default for GeoRangeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoRangeStore {
    /// Create a store holding only the fixed local-network ranges.
    pub fn new() -> Self {
        GeoRangeStore {
            table: RwLock::new(Arc::new(RangeTable::from_cidr_text(""))),
        }
    }

    /// Load ranges from a source, replacing the whole table on success.
    ///
    /// On failure the previous table stays authoritative. An empty source
    /// string is a no-op: the range engine keeps whatever is loaded (at
    /// minimum the local networks).
    pub async fn load(&self, geo_source: &str) -> Result<(), ProxyError> {
        if geo_source.is_empty() {
            return Ok(());
        }

        let text = load_source(geo_source).await?;
        let table = Arc::new(RangeTable::from_cidr_text(&text));
        let (v4, v6) = table.len();
        info!("Loaded geo ranges: {} IPv4, {} IPv6", v4, v6);

        *self.table.write().expect("range table lock poisoned") = table;
        Ok(())
    }

    /// Whether `ip` falls inside any loaded range.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.snapshot().contains(ip)
    }

    /// The current table snapshot.
    pub fn snapshot(&self) -> Arc<RangeTable> {
        self.table.read().expect("range table lock poisoned").clone()
    }
}
