//! Outbound header rewriting
//!
//! Optionally scrubs client-identifying headers before a request is
//! forwarded, gated by the configured policy.

use tracing::debug;
use std::net::IpAddr;

/// Headers that can reveal the real client address; all are overwritten
/// with the configured fake IP when a rewrite is active.
pub const CLIENT_IP_HEADERS: &[&str] = &[
    "X-Forwarded-For",
    "X-Real-IP",
    "X-Client-IP",
    "True-Client-IP",
    "CF-Connecting-IP",
    "Forwarded",
];

/// Never rewrite headers
pub const POLICY_NEVER: u8 = 0;
/// Always rewrite headers
pub const POLICY_ALWAYS: u8 = 1;
/// Rewrite only for public (non-private, non-loopback) targets
pub const POLICY_PUBLIC_ONLY: u8 = 2;

/// Whether an address belongs to a private, loopback or link-local network.
pub fn is_local_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            v6.is_loopback()
                || (octets[0] & 0xfe) == 0xfc // fc00::/7
                || (octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80) // fe80::/10
        }
    }
}

/// Decide whether the rewrite applies for a target host under a policy.
///
/// Policy 2 resolves domain targets first; a resolution failure counts
/// the target as public, so the rewrite proceeds.
pub async fn should_rewrite(policy: u8, host: &str) -> bool {
    match policy {
        POLICY_NEVER => false,
        POLICY_ALWAYS => true,
        _ => {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return !is_local_address(ip);
            }
            match tokio::net::lookup_host((host, 0)).await {
                Ok(mut addrs) => !addrs.any(|addr| is_local_address(addr.ip())),
                Err(e) => {
                    debug!("DNS lookup failed for {}, rewriting anyway: {}", host, e);
                    true
                }
            }
        }
    }
}

/// Apply the rewrite: enable do-not-track and overwrite every
/// client-IP-revealing header with `fake_ip`.
pub fn apply(headers: &mut Vec<(String, String)>, fake_ip: &str) {
    headers.retain(|(name, _)| {
        !name.eq_ignore_ascii_case("DNT")
            && !CLIENT_IP_HEADERS
                .iter()
                .any(|h| name.eq_ignore_ascii_case(h))
    });

    headers.push(("DNT".to_string(), "1".to_string()));
    for name in CLIENT_IP_HEADERS {
        headers.push((name.to_string(), fake_ip.to_string()));
    }
}
