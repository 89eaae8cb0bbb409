//! Duplex tunnel
//!
//! Relays bytes between two established connections. Each direction copies
//! until its source reaches EOF or errors, then shuts down its own write
//! side so a half-closed stream still drains the other direction. The
//! caller gets control back only after both directions have finished, so
//! handler cleanup never races a still-running copy task.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Relay `a <-> b` until both directions complete.
///
/// Returns the byte counts copied `a -> b` and `b -> a`. Copy errors end
/// their direction and are logged, not propagated; an aborted tunnel is
/// ordinary connection teardown.
pub async fn relay<A, B>(a: A, b: B) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = async {
        let n = match tokio::io::copy(&mut a_read, &mut b_write).await {
            Ok(n) => n,
            Err(e) => {
                debug!("A->B copy ended: {}", e);
                0
            }
        };
        let _ = b_write.shutdown().await;
        n
    };

    let b_to_a = async {
        let n = match tokio::io::copy(&mut b_read, &mut a_write).await {
            Ok(n) => n,
            Err(e) => {
                debug!("B->A copy ended: {}", e);
                0
            }
        };
        let _ = a_write.shutdown().await;
        n
    };

    // Both directions must finish before the handler returns.
    tokio::join!(a_to_b, b_to_a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_relay_bidirectional() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay(server_a, server_b).await });

        client_a.write_all(b"message A->B").await.unwrap();
        let mut buf_b = vec![0u8; 12];
        client_b.read_exact(&mut buf_b).await.unwrap();
        assert_eq!(&buf_b, b"message A->B");

        client_b.write_all(b"message B->A").await.unwrap();
        let mut buf_a = vec![0u8; 12];
        client_a.read_exact(&mut buf_a).await.unwrap();
        assert_eq!(&buf_a, b"message B->A");

        drop(client_a);
        drop(client_b);

        let (up, down) = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(up, 12);
        assert_eq!(down, 12);
    }

    #[tokio::test]
    async fn test_relay_returns_only_after_both_directions() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay(server_a, server_b).await });

        // Close A entirely; B keeps its write side open and can still drain.
        client_a.write_all(b"last words").await.unwrap();
        drop(client_a);

        let mut buf = vec![0u8; 10];
        client_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"last words");

        // B's direction is still open, so the relay must not have finished.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!relay_handle.is_finished());

        drop(client_b);
        let result = tokio::time::timeout(Duration::from_secs(1), relay_handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_relay_half_close_drains_remaining_direction() {
        let (mut client_a, server_a) = duplex(64);
        let (mut client_b, server_b) = duplex(64);

        let relay_handle = tokio::spawn(async move { relay(server_a, server_b).await });

        // A sends EOF but keeps reading; B then streams data that must
        // still arrive through the half-closed tunnel.
        client_a.shutdown().await.unwrap();

        let payload = vec![0x5A; 4096];
        let writer = tokio::spawn(async move {
            client_b.write_all(&payload).await.unwrap();
            client_b.shutdown().await.unwrap();
            client_b
        });

        let mut received = Vec::new();
        client_a.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 4096);

        let _client_b = writer.await.unwrap();
        let (up, down) = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(up, 0);
        assert_eq!(down, 4096);
    }

    #[tokio::test]
    async fn test_relay_large_transfer_byte_exact() {
        let (mut client_a, server_a) = duplex(65536);
        let (mut client_b, server_b) = duplex(65536);

        let relay_handle = tokio::spawn(async move { relay(server_a, server_b).await });

        let data = (0..50000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let expected = data.clone();
        let writer = tokio::spawn(async move {
            client_a.write_all(&data).await.unwrap();
            drop(client_a);
        });

        let mut received = Vec::new();
        client_b.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, expected);

        writer.await.unwrap();
        drop(client_b);
        let (up, _) = relay_handle.await.unwrap();
        assert_eq!(up, 50000);
    }

    #[tokio::test]
    async fn test_relay_empty_transfer() {
        let (client_a, server_a) = duplex(1024);
        let (client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay(server_a, server_b).await });

        drop(client_a);
        drop(client_b);

        let (up, down) = tokio::time::timeout(Duration::from_secs(1), relay_handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((up, down), (0, 0));
    }
}
