//! SOCKS5 connection handler
//!
//! Runs the per-connection state machine: greeting, method selection,
//! CONNECT request, dial through the router, fixed reply, then the joined
//! duplex tunnel. Parse violations close the connection without a reply.

use crate::config::Config;
use crate::router::Router;
use crate::socks::parser::{read_greeting, read_request};
use crate::socks::reply::{send_failure, send_method_selection, send_success};
use crate::tunnel::relay;
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle one SOCKS5 client connection.
///
/// Returns once the tunnel has fully drained in both directions (or the
/// handshake failed). A dial failure is answered with the fixed failure
/// reply and is not an error of the handler itself.
pub async fn handle_connection<S>(mut stream: S, router: &Router, cfg: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Greeting violations close the connection with no reply bytes.
    read_greeting(&mut stream)
        .await
        .context("SOCKS5 greeting failed")?;

    // No-authentication is selected unconditionally, whatever was offered.
    send_method_selection(&mut stream)
        .await
        .context("Failed to write method selection")?;

    // Command and address-type violations also close silently.
    let target = read_request(&mut stream)
        .await
        .context("SOCKS5 request failed")?;

    info!("SOCKS5 CONNECT {}", target);

    let remote = match router.dial(&target.to_string(), cfg).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!("SOCKS5 dial to {} failed: {:#}", target, e);
            send_failure(&mut stream)
                .await
                .context("Failed to write failure reply")?;
            return Ok(());
        }
    };

    send_success(&mut stream)
        .await
        .context("Failed to write success reply")?;

    let (up, down) = relay(stream, remote).await;
    debug!("SOCKS5 tunnel to {} closed: {} up, {} down", target, up, down);

    Ok(())
}
