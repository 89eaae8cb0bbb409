//! HTTP request head parsing
//!
//! Reads the request line and headers off a buffered client stream.
//! Only the head is parsed; bodies and responses are relayed as raw bytes.

use crate::error::ProxyError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

/// Maximum number of header lines accepted in one request head
const MAX_HEADER_LINES: usize = 128;

/// Parsed request line and headers
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method, as sent
    pub method: String,
    /// Raw request target (authority for CONNECT, URL or path otherwise)
    pub target: String,
    /// HTTP version token, e.g. `HTTP/1.1`
    pub version: String,
    /// Header fields in arrival order
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Whether this is a CONNECT request
    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Tunnel target for a CONNECT request: the authority, defaulting to
    /// port 443 when the client omitted one.
    pub fn connect_target(&self) -> String {
        if self.target.contains(':') && !self.target.ends_with(']') {
            self.target.clone()
        } else {
            format!("{}:443", self.target)
        }
    }

    /// Forward target for a non-CONNECT request.
    ///
    /// The absolute-form host wins when present, else the `Host` header;
    /// port defaults to 80 (443 for an `https` absolute form).
    pub fn forward_target(&self) -> Result<String, ProxyError> {
        if self.target.starts_with("http://") || self.target.starts_with("https://") {
            let url = Url::parse(&self.target)
                .map_err(|e| ProxyError::Http(format!("bad request target: {}", e)))?;
            let host = url
                .host_str()
                .ok_or_else(|| ProxyError::Http("request target has no host".to_string()))?;
            let port = url.port_or_known_default().unwrap_or(80);
            return Ok(format!("{}:{}", host, port));
        }

        let host = self
            .header("host")
            .ok_or_else(|| ProxyError::Http("missing Host header".to_string()))?;
        if host.contains(':') && !host.ends_with(']') {
            Ok(host.to_string())
        } else {
            Ok(format!("{}:80", host))
        }
    }

    /// The origin-form path to forward upstream.
    pub fn origin_form(&self) -> String {
        if self.target.starts_with("http://") || self.target.starts_with("https://") {
            if let Ok(url) = Url::parse(&self.target) {
                let mut path = url.path().to_string();
                if let Some(query) = url.query() {
                    path.push('?');
                    path.push_str(query);
                }
                return path;
            }
        }
        self.target.clone()
    }
}

/// Read and parse a request head from a buffered stream.
pub async fn read_request_head<R>(reader: &mut R) -> Result<RequestHead, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    if request_line.is_empty() {
        return Err(ProxyError::Http("connection closed before request".to_string()));
    }

    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ProxyError::Http("empty request line".to_string()))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| ProxyError::Http("request line has no target".to_string()))?
        .to_string();
    let version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADER_LINES {
            return Err(ProxyError::Http("too many header lines".to_string()));
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}
