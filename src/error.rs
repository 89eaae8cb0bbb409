//! Error types for GeoSplit
//!
//! This module defines the error taxonomy used throughout the proxy.
//! Connection-level failures (dial errors, protocol errors) stay inside
//! their handler task and are mapped to protocol replies; the types here
//! exist so callers and tests can match on the failure kind.

use std::io;
use thiserror::Error;

/// Main error type for GeoSplit operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error (unsupported local/remote mode, bad field)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener bind failure
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        /// The address that could not be bound
        addr: String,
        /// The underlying bind error
        source: io::Error,
    },

    /// Geo source unreachable with no usable cache
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),

    /// Malformed HTTP request head
    #[error("HTTP protocol error: {0}")]
    Http(String),
}

/// SOCKS5 protocol parse errors
///
/// Each parse step of the handshake reports its own kind so the handler
/// (and tests) can distinguish a bad version from a bad command or address
/// type without inspecting log output.
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Unexpected version byte in the greeting or request
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Command other than CONNECT
    #[error("Unsupported SOCKS5 command: {0}")]
    UnsupportedCommand(u8),

    /// Address type outside {IPv4, domain, IPv6}
    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(u8),

    /// Zero-length or non-UTF-8 domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// IO failure while reading handshake bytes
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::Config("unsupported local_mode: quic".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: unsupported local_mode: quic"
        );

        let err = ProxyError::RemoteFetch("no cache available".to_string());
        assert_eq!(format!("{}", err), "Remote fetch failed: no cache available");

        let err = ProxyError::Http("missing host".to_string());
        assert_eq!(format!("{}", err), "HTTP protocol error: missing host");
    }

    #[test]
    fn test_listen_error_display() {
        let err = ProxyError::Listen {
            addr: "127.0.0.1:1080".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("127.0.0.1:1080"));
        assert!(msg.contains("in use"));
    }

    #[test]
    fn test_proxy_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "io error");
        let err: ProxyError = io_err.into();
        assert!(matches!(err, ProxyError::Io(_)));
    }

    #[test]
    fn test_proxy_error_from_socks5() {
        let err: ProxyError = Socks5Error::UnsupportedVersion(4).into();
        assert!(matches!(
            err,
            ProxyError::Socks5(Socks5Error::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn test_socks5_error_display() {
        assert_eq!(
            format!("{}", Socks5Error::UnsupportedVersion(4)),
            "Unsupported SOCKS version: 4"
        );
        assert_eq!(
            format!("{}", Socks5Error::UnsupportedCommand(2)),
            "Unsupported SOCKS5 command: 2"
        );
        assert_eq!(
            format!("{}", Socks5Error::UnsupportedAddressType(0x99)),
            "Unsupported address type: 153"
        );
    }
}
