//! HTTP front-end
//!
//! Serves HTTP proxy semantics: CONNECT tunnels and single-request
//! forward proxying, both dialing through the router. Only request heads
//! are parsed; tunnel bytes, bodies and responses are relayed raw.

mod request;
mod rewrite;

pub use request::{read_request_head, RequestHead};
pub use rewrite::{apply as apply_rewrite, is_local_address, should_rewrite, CLIENT_IP_HEADERS};

use crate::config::{Config, ConfigHandle};
use crate::router::{split_host_port, Router};
use crate::tunnel::relay;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Accept loop for the HTTP front-end.
///
/// One handler task per connection, unbounded by design. Returns when the
/// listener closes; in-flight tunnels keep running.
pub async fn serve(listener: TcpListener, router: Arc<Router>, config: ConfigHandle) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("HTTP accept error: {}", e);
                return;
            }
        };

        debug!("HTTP connection from {}", peer);
        let router = router.clone();
        let cfg = config.snapshot();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &router, &cfg).await {
                debug!("HTTP connection from {} ended: {:#}", peer, e);
            }
        });
    }
}

/// Handle one HTTP client connection (single request, then tunnel/relay).
pub async fn handle_connection(stream: TcpStream, router: &Router, cfg: &Config) -> Result<()> {
    let mut reader = BufReader::new(stream);
    let head = read_request_head(&mut reader).await?;

    info!("HTTP {} {}", head.method, head.target);

    if head.is_connect() {
        handle_connect(reader, head, router, cfg).await
    } else {
        handle_forward(reader, head, router, cfg).await
    }
}

/// CONNECT: dial, answer 200 or 503, then joined raw tunnel.
async fn handle_connect(
    mut reader: BufReader<TcpStream>,
    head: RequestHead,
    router: &Router,
    cfg: &Config,
) -> Result<()> {
    let target = head.connect_target();

    let mut remote = match router.dial(&target, cfg).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!("CONNECT dial to {} failed: {:#}", target, e);
            send_status(reader.get_mut(), 503, "Service Unavailable").await?;
            return Ok(());
        }
    };

    reader
        .get_mut()
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await
        .context("Failed to write tunnel reply")?;

    // Bytes the client pipelined behind the request head belong to the
    // tunnel, not to the HTTP layer.
    let leftover = reader.buffer().to_vec();
    if !leftover.is_empty() {
        remote.write_all(&leftover).await?;
    }

    let (up, down) = relay(reader.into_inner(), remote).await;
    debug!("CONNECT tunnel to {} closed: {} up, {} down", target, up, down);
    Ok(())
}

/// Plain forward proxying: rewrite gate, reconstructed head, one request
/// per connection.
///
/// Only the declared request body is forwarded upstream; the connection
/// closes after the response, so a pipelined or keep-alive follow-up
/// request can never slip past the rewrite gate as raw tunnel bytes.
async fn handle_forward(
    mut reader: BufReader<TcpStream>,
    head: RequestHead,
    router: &Router,
    cfg: &Config,
) -> Result<()> {
    let target = match head.forward_target() {
        Ok(target) => target,
        Err(e) => {
            send_status(reader.get_mut(), 400, "Bad Request").await?;
            return Err(e.into());
        }
    };

    let mut remote = match router.dial(&target, cfg).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!("HTTP dial to {} failed: {:#}", target, e);
            send_status(reader.get_mut(), 502, "Bad Gateway").await?;
            return Ok(());
        }
    };

    let mut headers = head.headers.clone();
    let (host, _) = split_host_port(&target);
    if should_rewrite(cfg.header_rewrite_policy, host).await {
        debug!("Rewriting outbound headers for {}", target);
        apply_rewrite(&mut headers, &cfg.fake_ip);
    }

    // Single-request semantics: the origin is told to close after
    // responding, whatever the client asked for.
    headers.retain(|(name, _)| {
        !name.eq_ignore_ascii_case("Connection") && !name.eq_ignore_ascii_case("Proxy-Connection")
    });
    headers.push(("Connection".to_string(), "close".to_string()));

    let mut request = format!("{} {} {}\r\n", head.method, head.origin_form(), head.version);
    for (name, value) in &headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");

    remote
        .write_all(request.as_bytes())
        .await
        .context("Failed to forward request head")?;

    if head.header("transfer-encoding").is_some() {
        // Chunked body length is unknown up front; stream the connection
        // raw. The forced Connection: close still ends reuse.
        let leftover = reader.buffer().to_vec();
        if !leftover.is_empty() {
            remote.write_all(&leftover).await?;
        }
        let (up, down) = relay(reader.into_inner(), remote).await;
        debug!("HTTP relay to {} closed: {} up, {} down", target, up, down);
        return Ok(());
    }

    // Forward exactly the declared body, nothing past it.
    let body_len = head
        .header("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if body_len > 0 {
        let mut body = (&mut reader).take(body_len);
        tokio::io::copy(&mut body, &mut remote)
            .await
            .context("Failed to forward request body")?;
    }

    // The response (status, headers, body) flows back untouched until
    // the origin closes.
    let down = match tokio::io::copy(&mut remote, reader.get_mut()).await {
        Ok(n) => n,
        Err(e) => {
            debug!("Response copy from {} ended: {}", target, e);
            0
        }
    };
    let _ = reader.get_mut().shutdown().await;
    debug!("HTTP relay to {} closed: {} up, {} down", target, body_len, down);
    Ok(())
}

async fn send_status(stream: &mut TcpStream, code: u16, message: &str) -> Result<()> {
    let response = format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n", code, message);
    stream
        .write_all(response.as_bytes())
        .await
        .context("Failed to write error response")?;
    Ok(())
}
