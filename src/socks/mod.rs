//! SOCKS5 front-end
//!
//! A minimal, unauthenticated, CONNECT-only SOCKS5 server. The accept
//! loop dispatches one handler task per connection; there is deliberately
//! no connection cap or admission control.

mod consts;
mod handler;
mod parser;
mod reply;
mod types;

pub use consts::*;
pub use handler::handle_connection;
pub use parser::{read_greeting, read_request};
pub use reply::{send_failure, send_method_selection, send_success, METHOD_REPLY};
pub use types::TargetAddr;

use crate::config::ConfigHandle;
use crate::router::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

/// Accept loop for the SOCKS5 front-end.
///
/// Each connection gets its own task and its own config snapshot. Returns
/// when the listener is closed (the lifecycle manager aborts this task on
/// restart; running handler tasks are left to finish naturally).
pub async fn serve(listener: TcpListener, router: Arc<Router>, config: ConfigHandle) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("SOCKS5 accept error: {}", e);
                return;
            }
        };

        debug!("SOCKS5 connection from {}", peer);
        let router = router.clone();
        let cfg = config.snapshot();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &router, &cfg).await {
                debug!("SOCKS5 connection from {} ended: {:#}", peer, e);
            }
        });
    }
}
