//! Chained upstream dialer
//!
//! Builds client connections through the configured upstream proxy,
//! speaking either SOCKS5 (no authentication) or HTTP CONNECT toward it.

use crate::config::{Config, ProxyMode};
use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tracing::debug;

/// Connect to `host:port` through the configured upstream proxy.
///
/// The remote mode is validated before any socket is opened; an
/// unsupported mode refuses to build the chain with a configuration error.
pub async fn connect_upstream(cfg: &Config, host: &str, port: u16) -> Result<TcpStream> {
    let mode = cfg.remote_mode()?;
    let upstream = cfg.upstream.addr();

    let mut stream = TcpStream::connect(&upstream)
        .await
        .with_context(|| format!("Failed to connect to upstream proxy {}", upstream))?;

    match mode {
        ProxyMode::Socks5 => {
            async_socks5::connect(&mut stream, (host.to_string(), port), None)
                .await
                .with_context(|| format!("SOCKS5 CONNECT to {}:{} via {} failed", host, port, upstream))?;
        }
        ProxyMode::Http => {
            async_http_proxy::http_connect_tokio(&mut stream, host, port)
                .await
                .with_context(|| format!("HTTP CONNECT to {}:{} via {} failed", host, port, upstream))?;
        }
    }

    debug!("Chained connection to {}:{} via {} ({})", host, port, upstream, mode);
    Ok(stream)
}
