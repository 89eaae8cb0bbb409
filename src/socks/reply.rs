//! SOCKS5 replies
//!
//! This server always answers with zeroed bind address and port; clients
//! of a CONNECT-only proxy do not consume the bind fields.

use crate::socks::consts::*;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Method-selection reply: no authentication.
pub const METHOD_REPLY: [u8; 2] = [SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE];

fn reply_bytes(code: u8) -> [u8; 10] {
    [
        SOCKS5_VERSION,
        code,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}

/// Send the method-selection reply accepting no-authentication.
pub async fn send_method_selection<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&METHOD_REPLY).await?;
    stream.flush().await
}

/// Send the fixed success reply (bind fields zeroed).
pub async fn send_success<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&reply_bytes(SOCKS5_REPLY_SUCCEEDED)).await?;
    stream.flush().await
}

/// Send the fixed general-failure reply.
pub async fn send_failure<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&reply_bytes(SOCKS5_REPLY_GENERAL_FAILURE)).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_method_selection_bytes() {
        let mut buffer = Vec::new();
        send_method_selection(&mut buffer).await.unwrap();
        assert_eq!(buffer, vec![0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_success_reply_bytes() {
        let mut buffer = Vec::new();
        send_success(&mut buffer).await.unwrap();
        assert_eq!(buffer, vec![0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_failure_reply_bytes() {
        let mut buffer = Vec::new();
        send_failure(&mut buffer).await.unwrap();
        assert_eq!(buffer, vec![0x05, 0x01, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }
}
