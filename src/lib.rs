//! # GeoSplit - Geo-Aware Local Forwarding Proxy
//!
//! GeoSplit is a local forwarding proxy that splits traffic by destination:
//! targets inside a configured set of IP ranges (typically a country's
//! address space, plus local networks) are dialed directly, while everything
//! else is relayed through an upstream proxy.
//!
//! ## Features
//!
//! - **Two Front-Ends**: HTTP (CONNECT + plain forward) or minimal SOCKS5,
//!   selected by configuration
//! - **Range Engine**: CIDR lists from a local file or URL, with a cached
//!   remote copy and binary-searched lookups
//! - **Chained Upstream**: SOCKS5 or HTTP CONNECT upstream for non-matching
//!   targets
//! - **Live Reload**: SIGHUP reloads configuration and ranges and swaps the
//!   listener without dropping established tunnels
//! - **Header Hygiene**: optional rewrite of client-IP-revealing headers on
//!   forwarded plain HTTP requests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geosplit::config::{load_config, ConfigHandle};
//! use geosplit::geoip::GeoRangeStore;
//! use geosplit::listener::{ListenerManager, RestartHandle};
//! use geosplit::router::Router;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let store = Arc::new(GeoRangeStore::new());
//!     store.load(&config.geo_source).await?;
//!
//!     let handle = ConfigHandle::new(config);
//!     let router = Arc::new(Router::new(store));
//!     let (manager, _status) = ListenerManager::new(handle, router);
//!     let (_restart, restarts) = RestartHandle::new();
//!
//!     manager.run(restarts).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Client -> Front-End (HTTP | SOCKS5) -> Router -> Direct -> Target
//!                                               -> Chained -> Upstream Proxy -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod geoip;
pub mod http;
pub mod listener;
pub mod router;
pub mod socks;
pub mod tunnel;

// Re-export commonly used items
pub use config::{load_config, Config, ConfigHandle};
pub use error::{ProxyError, Socks5Error};
pub use geoip::GeoRangeStore;
pub use listener::{ListenerManager, ProxyStatus, RestartHandle};
pub use router::{Route, Router};

/// Version of the GeoSplit library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
