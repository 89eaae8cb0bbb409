//! SOCKS5 handshake parsing
//!
//! Reads the greeting and the CONNECT request off the client stream.
//! Every violation maps to a distinct [`Socks5Error`] kind; the handler
//! decides whether any reply bytes are written.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::TargetAddr;
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read the client greeting: version plus offered methods.
///
/// The offered methods are read and discarded; this server always selects
/// no-authentication regardless of the offer.
pub async fn read_greeting<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(header[0]));
    }

    let mut methods = vec![0u8; header[1] as usize];
    stream.read_exact(&mut methods).await?;

    Ok(())
}

/// Read the CONNECT request and extract the target address.
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD | X'00' | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// ```
pub async fn read_request<S>(stream: &mut S) -> Result<TargetAddr, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(header[0]));
    }
    if header[1] != SOCKS5_CMD_TCP_CONNECT {
        return Err(Socks5Error::UnsupportedCommand(header[1]));
    }

    let addr_type = header[3];
    let addr = read_address(stream, addr_type).await?;
    let port = read_port(stream).await?;

    Ok(match addr {
        Address::V4(ip) => TargetAddr::ipv4(ip, port),
        Address::V6(ip) => TargetAddr::ipv6(ip, port),
        Address::Domain(domain) => TargetAddr::domain(domain, port),
    })
}

enum Address {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Domain(String),
}

async fn read_address<S>(stream: &mut S, addr_type: u8) -> Result<Address, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            stream.read_exact(&mut addr).await?;
            Ok(Address::V4(Ipv4Addr::from(addr)))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len_buf = [0u8; 1];
            stream.read_exact(&mut len_buf).await?;
            let domain_len = len_buf[0] as usize;

            if domain_len == 0 || domain_len > MAX_DOMAIN_LEN {
                return Err(Socks5Error::InvalidDomain(format!(
                    "invalid length: {}",
                    domain_len
                )));
            }

            let mut domain_buf = vec![0u8; domain_len];
            stream.read_exact(&mut domain_buf).await?;
            let domain = String::from_utf8(domain_buf)
                .map_err(|_| Socks5Error::InvalidDomain("not UTF-8".to_string()))?;

            Ok(Address::Domain(domain))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut addr = [0u8; 16];
            stream.read_exact(&mut addr).await?;
            Ok(Address::V6(Ipv6Addr::from(addr)))
        }

        other => Err(Socks5Error::UnsupportedAddressType(other)),
    }
}

async fn read_port<S>(stream: &mut S) -> Result<u16, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn connect_request_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        request.extend_from_slice(&ip);
        request.extend_from_slice(&port.to_be_bytes());
        request
    }

    fn connect_request_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        request.extend_from_slice(domain.as_bytes());
        request.extend_from_slice(&port.to_be_bytes());
        request
    }

    #[tokio::test]
    async fn test_read_greeting() {
        let mut cursor = Cursor::new(vec![SOCKS5_VERSION, 2, 0x00, 0x02]);
        read_greeting(&mut cursor).await.unwrap();
        assert_eq!(cursor.position(), 4);
    }

    #[tokio::test]
    async fn test_read_greeting_bad_version() {
        let mut cursor = Cursor::new(vec![0x04, 1, 0x00]);
        let err = read_greeting(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedVersion(0x04)));
    }

    #[tokio::test]
    async fn test_read_greeting_truncated() {
        let mut cursor = Cursor::new(vec![SOCKS5_VERSION]);
        let err = read_greeting(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::Io(_)));
    }

    #[tokio::test]
    async fn test_read_request_ipv4() {
        let mut cursor = Cursor::new(connect_request_ipv4([192, 168, 1, 1], 8080));
        let target = read_request(&mut cursor).await.unwrap();
        assert_eq!(target.to_string(), "192.168.1.1:8080");
    }

    #[tokio::test]
    async fn test_read_request_domain() {
        let mut cursor = Cursor::new(connect_request_domain("example.com", 443));
        let target = read_request(&mut cursor).await.unwrap();
        assert_eq!(target, TargetAddr::domain("example.com".to_string(), 443));
    }

    #[tokio::test]
    async fn test_read_request_ipv6() {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV6,
        ];
        request.extend_from_slice(&[0u8; 15]);
        request.push(1); // ::1
        request.extend_from_slice(&80u16.to_be_bytes());

        let mut cursor = Cursor::new(request);
        let target = read_request(&mut cursor).await.unwrap();
        assert_eq!(target.to_string(), "[::1]:80");
    }

    #[tokio::test]
    async fn test_read_request_bad_version() {
        let mut request = connect_request_ipv4([127, 0, 0, 1], 80);
        request[0] = 0x04;
        let mut cursor = Cursor::new(request);
        let err = read_request(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedVersion(0x04)));
    }

    #[tokio::test]
    async fn test_read_request_bind_command_rejected() {
        let mut request = connect_request_ipv4([127, 0, 0, 1], 80);
        request[1] = 0x02; // BIND
        let mut cursor = Cursor::new(request);
        let err = read_request(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedCommand(0x02)));
    }

    #[tokio::test]
    async fn test_read_request_udp_associate_rejected() {
        let mut request = connect_request_ipv4([127, 0, 0, 1], 80);
        request[1] = 0x03; // UDP ASSOCIATE
        let mut cursor = Cursor::new(request);
        let err = read_request(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedCommand(0x03)));
    }

    #[tokio::test]
    async fn test_read_request_bad_address_type() {
        let mut request = connect_request_ipv4([127, 0, 0, 1], 80);
        request[3] = 0x09;
        let mut cursor = Cursor::new(request);
        let err = read_request(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedAddressType(0x09)));
    }

    #[tokio::test]
    async fn test_read_request_zero_length_domain() {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            0,
        ];
        request.extend_from_slice(&80u16.to_be_bytes());
        let mut cursor = Cursor::new(request);
        let err = read_request(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Socks5Error::InvalidDomain(_)));
    }
}
