//! Listener lifecycle
//!
//! Owns the single front-end listener and swaps it live when the
//! configuration changes. Restart aborts only the accept loop; tunnels
//! already established keep their pre-restart configuration and run to
//! completion.

use crate::config::{ConfigHandle, ProxyMode};
use crate::error::ProxyError;
use crate::router::Router;
use crate::{http, socks};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Externally observable listener state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyStatus {
    /// No listener bound yet
    Starting,
    /// HTTP front-end accepting on the given address
    RunningHttp(SocketAddr),
    /// SOCKS5 front-end accepting on the given address
    RunningSocks5(SocketAddr),
    /// Old listener torn down, new one not bound yet
    Restarting,
    /// Bind or configuration failure; no listener is active
    Error(String),
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyStatus::Starting => write!(f, "starting"),
            ProxyStatus::RunningHttp(addr) => write!(f, "running http on {}", addr),
            ProxyStatus::RunningSocks5(addr) => write!(f, "running socks5 on {}", addr),
            ProxyStatus::Restarting => write!(f, "restarting"),
            ProxyStatus::Error(e) => write!(f, "error: {}", e),
        }
    }
}

struct ActiveListener {
    task: JoinHandle<()>,
    addr: SocketAddr,
    mode: ProxyMode,
}

/// Owns the front-end listener and restarts it on demand.
pub struct ListenerManager {
    config: ConfigHandle,
    router: Arc<Router>,
    current: Mutex<Option<ActiveListener>>,
    status_tx: watch::Sender<ProxyStatus>,
}

impl ListenerManager {
    /// Create a manager; nothing is bound until the first restart.
    pub fn new(config: ConfigHandle, router: Arc<Router>) -> (Self, watch::Receiver<ProxyStatus>) {
        let (status_tx, status_rx) = watch::channel(ProxyStatus::Starting);
        let manager = ListenerManager {
            config,
            router,
            current: Mutex::new(None),
            status_tx,
        };
        (manager, status_rx)
    }

    /// Subscribe to status updates.
    pub fn status(&self) -> watch::Receiver<ProxyStatus> {
        self.status_tx.subscribe()
    }

    /// Tear down the current listener (if any) and bind per the current
    /// configuration.
    ///
    /// On failure the previous listener is already gone; the proxy stays
    /// in [`ProxyStatus::Error`] until the next restart succeeds.
    pub async fn restart(&self) -> Result<(), ProxyError> {
        let mut current = self.current.lock().await;

        if let Some(previous) = current.take() {
            info!(
                "Stopping {} listener on {}",
                previous.mode, previous.addr
            );
            previous.task.abort();
            // The abort is asynchronous; wait for the task to actually
            // drop its socket so rebinding the same port cannot race it.
            let _ = previous.task.await;
            let _ = self.status_tx.send(ProxyStatus::Restarting);
        }

        let cfg = self.config.snapshot();

        let mode = match cfg.local_mode() {
            Ok(mode) => mode,
            Err(e) => {
                error!("Cannot start listener: {}", e);
                let _ = self.status_tx.send(ProxyStatus::Error(e.to_string()));
                return Err(e);
            }
        };

        let listen_addr = cfg.listen_addr();
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind {}: {}", listen_addr, e);
                let err = ProxyError::Listen {
                    addr: listen_addr,
                    source: e,
                };
                let _ = self.status_tx.send(ProxyStatus::Error(err.to_string()));
                return Err(err);
            }
        };
        let addr = listener.local_addr().map_err(ProxyError::Io)?;

        info!("Listening in {} mode on {}", mode, addr);

        let router = self.router.clone();
        let config = self.config.clone();
        let task = match mode {
            ProxyMode::Http => {
                let _ = self.status_tx.send(ProxyStatus::RunningHttp(addr));
                tokio::spawn(http::serve(listener, router, config))
            }
            ProxyMode::Socks5 => {
                let _ = self.status_tx.send(ProxyStatus::RunningSocks5(addr));
                tokio::spawn(socks::serve(listener, router, config))
            }
        };

        *current = Some(ActiveListener { task, addr, mode });
        Ok(())
    }

    /// Address of the active listener, if one is bound.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.current.lock().await.as_ref().map(|l| l.addr)
    }

    /// Stop the active listener without starting a new one.
    pub async fn shutdown(&self) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            info!("Shutting down {} listener on {}", previous.mode, previous.addr);
            previous.task.abort();
            let _ = previous.task.await;
        }
        let _ = self.status_tx.send(ProxyStatus::Starting);
    }

    /// Serve restart requests until the channel closes.
    ///
    /// Requests are processed one at a time; senders use a bounded channel
    /// with `try_send` so a burst of triggers collapses into at most one
    /// pending restart.
    pub async fn run(&self, mut restarts: mpsc::Receiver<()>) {
        if let Err(e) = self.restart().await {
            error!("Initial listener start failed: {}", e);
        }

        while restarts.recv().await.is_some() {
            if let Err(e) = self.restart().await {
                error!("Listener restart failed: {}", e);
            }
        }
    }
}

/// Handle used to request a listener restart.
///
/// Coalescing by construction: the channel holds one pending request and
/// `try_send` drops triggers that arrive while one is already queued.
#[derive(Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<()>,
}

impl RestartHandle {
    /// Create the handle and the receiver the manager drains.
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (RestartHandle { tx }, rx)
    }

    /// Request a restart; a no-op when one is already pending.
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
    }
}
