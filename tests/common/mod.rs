//! Test utilities for GeoSplit integration tests
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use geosplit::config::{parse_config, Config, ConfigHandle};
use geosplit::geoip::GeoRangeStore;
use geosplit::router::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Spawn an echo server that accepts connections and echoes everything
/// back until the peer closes.
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Router whose store holds only the fixed local network ranges.
pub fn locals_only_router() -> Arc<Router> {
    Arc::new(Router::new(Arc::new(GeoRangeStore::new())))
}

/// Test configuration builder
pub struct TestConfigBuilder {
    listen_port: u16,
    local_mode: String,
    remote_mode: String,
    upstream: Option<SocketAddr>,
    header_rewrite_policy: u8,
    fake_ip: Option<String>,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            listen_port: 0,
            local_mode: "socks5".to_string(),
            remote_mode: "socks5".to_string(),
            upstream: None,
            header_rewrite_policy: 0,
            fake_ip: None,
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the front-end mode
    pub fn local_mode(mut self, mode: &str) -> Self {
        self.local_mode = mode.to_string();
        self
    }

    /// Set the upstream mode
    pub fn remote_mode(mut self, mode: &str) -> Self {
        self.remote_mode = mode.to_string();
        self
    }

    /// Set the upstream proxy address
    pub fn upstream(mut self, addr: SocketAddr) -> Self {
        self.upstream = Some(addr);
        self
    }

    /// Set the header rewrite policy
    pub fn header_rewrite_policy(mut self, policy: u8) -> Self {
        self.header_rewrite_policy = policy;
        self
    }

    /// Set the fake client IP
    pub fn fake_ip(mut self, ip: &str) -> Self {
        self.fake_ip = Some(ip.to_string());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        let mut content = format!(
            "listen_port = {}\nlocal_mode = \"{}\"\nremote_mode = \"{}\"\nheader_rewrite_policy = {}\n",
            self.listen_port, self.local_mode, self.remote_mode, self.header_rewrite_policy
        );
        if let Some(fake_ip) = &self.fake_ip {
            content.push_str(&format!("fake_ip = \"{}\"\n", fake_ip));
        }
        if let Some(upstream) = self.upstream {
            content.push_str(&format!(
                "[upstream]\nip = \"{}\"\nport = {}\n",
                upstream.ip(),
                upstream.port()
            ));
        }
        parse_config(&content).unwrap()
    }

    /// Build a shared configuration handle
    pub fn build_handle(self) -> ConfigHandle {
        ConfigHandle::new(self.build())
    }
}
