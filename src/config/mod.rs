//! Configuration module for GeoSplit
//!
//! Defines the configuration consumed by the proxy core and the snapshot
//! handle shared with the external management surface. The core never reads
//! mutable configuration directly; every operation takes an owned snapshot.

use crate::error::ProxyError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Fake client IP written into rewritten headers when none is configured
pub const DEFAULT_FAKE_IP: &str = "31.13.77.33";

fn default_listen_on() -> String {
    "127.0.0.1".to_string()
}

fn default_local_mode() -> String {
    "http".to_string()
}

fn default_remote_mode() -> String {
    "socks5".to_string()
}

fn default_fake_ip() -> String {
    DEFAULT_FAKE_IP.to_string()
}

/// Front-end / upstream protocol mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// HTTP proxy (CONNECT + forward)
    Http,
    /// Minimal SOCKS5 (CONNECT only, no auth)
    Socks5,
}

impl FromStr for ProxyMode {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyMode::Http),
            "socks5" => Ok(ProxyMode::Socks5),
            other => Err(ProxyError::Config(format!("unsupported mode: {}", other))),
        }
    }
}

impl std::fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyMode::Http => write!(f, "http"),
            ProxyMode::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Upstream ("chained") proxy endpoint
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UpstreamConfig {
    /// Upstream proxy host or IP
    #[serde(default)]
    pub ip: String,

    /// Upstream proxy port
    #[serde(default)]
    pub port: u16,
}

impl UpstreamConfig {
    /// Render as a dialable `host:port` string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Root configuration structure
///
/// Mode fields are kept as raw strings so that an unsupported value is a
/// runtime [`ProxyError::Config`] when the listener or chain dialer consults
/// it, not a parse failure that rejects the whole file.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_on")]
    pub listen_on: String,

    /// Port to listen on
    pub listen_port: u16,

    /// Front-end protocol: "http" or "socks5"
    #[serde(default = "default_local_mode")]
    pub local_mode: String,

    /// Upstream protocol: "http" or "socks5"
    #[serde(default = "default_remote_mode")]
    pub remote_mode: String,

    /// Upstream proxy used for chained targets
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Geo range source: local path or http(s) URL; empty disables loading
    #[serde(default)]
    pub geo_source: String,

    /// Header rewrite policy: 0 = never, 1 = always, 2 = public targets only
    #[serde(default)]
    pub header_rewrite_policy: u8,

    /// Value written into client-IP-revealing headers when rewriting
    #[serde(default = "default_fake_ip")]
    pub fake_ip: String,
}

impl Config {
    /// The `host:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_on, self.listen_port)
    }

    /// Parse the configured front-end mode
    pub fn local_mode(&self) -> Result<ProxyMode, ProxyError> {
        self.local_mode
            .parse()
            .map_err(|_| ProxyError::Config(format!("unsupported local_mode: {}", self.local_mode)))
    }

    /// Parse the configured upstream mode
    pub fn remote_mode(&self) -> Result<ProxyMode, ProxyError> {
        self.remote_mode.parse().map_err(|_| {
            ProxyError::Config(format!("unsupported remote_mode: {}", self.remote_mode))
        })
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

/// Shared configuration handle
///
/// The management surface owns the writer side; the proxy core only ever
/// takes owned snapshots, so a concurrent update can never expose a
/// half-written configuration to an in-flight connection.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Config>>,
}

impl ConfigHandle {
    /// Wrap an initial configuration
    pub fn new(config: Config) -> Self {
        ConfigHandle {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Take an owned snapshot of the current configuration
    pub fn snapshot(&self) -> Config {
        self.inner.read().expect("config lock poisoned").clone()
    }

    /// Replace the configuration wholesale
    pub fn replace(&self, config: Config) {
        *self.inner.write().expect("config lock poisoned") = config;
    }
}
