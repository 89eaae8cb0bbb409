//! Address range table
//!
//! Parses CIDR text into sorted per-family range tables and answers
//! membership queries by binary search.
//!
//! IPv4 ranges are inclusive `u32` intervals; IPv6 ranges are inclusive
//! 16-byte intervals compared byte-wise, which orders addresses correctly
//! since they are fixed-width big-endian.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

/// Private, loopback and link-local networks appended after every load.
///
/// Destinations inside these ranges are always routed directly, no matter
/// what the configured geo source contains.
pub const LOCAL_NETWORK_RANGES: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Inclusive IPv4 address interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Range {
    /// First address of the interval
    pub start: u32,
    /// Last address of the interval (inclusive)
    pub end: u32,
}

/// Inclusive IPv6 address interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Range {
    /// First address of the interval
    pub start: [u8; 16],
    /// Last address of the interval (inclusive)
    pub end: [u8; 16],
}

enum ParsedCidr {
    V4(Ipv4Range),
    V6(Ipv6Range),
}

/// Parse one CIDR line into an inclusive range.
///
/// The host part below the prefix is masked off, so `10.1.2.3/8` yields the
/// same range as `10.0.0.0/8`.
fn parse_cidr(line: &str) -> Option<ParsedCidr> {
    let (addr, prefix) = line.split_once('/')?;
    let prefix: u8 = prefix.trim().parse().ok()?;

    match addr.trim().parse::<IpAddr>().ok()? {
        IpAddr::V4(ip) => {
            if prefix > 32 {
                return None;
            }
            let mask: u32 = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - prefix)
            };
            let start = u32::from(ip) & mask;
            let end = start | !mask;
            Some(ParsedCidr::V4(Ipv4Range { start, end }))
        }
        IpAddr::V6(ip) => {
            if prefix > 128 {
                return None;
            }
            let bytes = ip.octets();
            let mut start = [0u8; 16];
            let mut end = [0u8; 16];
            for i in 0..16 {
                let bit_offset = (i as u32) * 8;
                let bits = (prefix as u32).saturating_sub(bit_offset).min(8);
                let mask: u8 = if bits == 0 { 0 } else { 0xFFu8 << (8 - bits) };
                start[i] = bytes[i] & mask;
                end[i] = start[i] | !mask;
            }
            Some(ParsedCidr::V6(Ipv6Range { start, end }))
        }
    }
}

/// Sorted per-family range table
///
/// Both sequences are sorted ascending by `start` after construction; the
/// table may contain overlapping entries, which is harmless for membership
/// queries.
#[derive(Debug, Clone, Default)]
pub struct RangeTable {
    v4: Vec<Ipv4Range>,
    v6: Vec<Ipv6Range>,
}

impl RangeTable {
    /// Build a table from CIDR text.
    ///
    /// One CIDR per line; blank lines and `#` comments are ignored and
    /// malformed lines are skipped with a warning. The fixed local-network
    /// ranges are always appended after the user-supplied entries.
    pub fn from_cidr_text(text: &str) -> RangeTable {
        let mut table = RangeTable::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_cidr(line) {
                Some(ParsedCidr::V4(range)) => table.v4.push(range),
                Some(ParsedCidr::V6(range)) => table.v6.push(range),
                None => warn!("Skipping invalid CIDR {:?}", line),
            }
        }

        table.append_local_networks();
        table.sort();
        table
    }

    fn append_local_networks(&mut self) {
        for cidr in LOCAL_NETWORK_RANGES {
            match parse_cidr(cidr) {
                Some(ParsedCidr::V4(range)) => self.v4.push(range),
                Some(ParsedCidr::V6(range)) => self.v6.push(range),
                None => unreachable!("builtin CIDR is valid"),
            }
        }
    }

    fn sort(&mut self) {
        self.v4.sort_by_key(|r| r.start);
        self.v6.sort_by_key(|r| r.start);
    }

    /// Number of (IPv4, IPv6) ranges in the table
    pub fn len(&self) -> (usize, usize) {
        (self.v4.len(), self.v6.len())
    }

    /// Whether the table holds no ranges at all
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    /// Whether `ip` falls within any range.
    ///
    /// IPv4-mapped IPv6 addresses are queried against the IPv4 table.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.contains_v4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(mapped) => self.contains_v4(mapped),
                None => self.contains_v6(v6),
            },
        }
    }

    fn contains_v4(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        // First range whose end is not below the address.
        let i = self.v4.partition_point(|r| r.end < ip);
        i < self.v4.len() && self.v4[i].start <= ip
    }

    fn contains_v6(&self, ip: Ipv6Addr) -> bool {
        let ip = ip.octets();
        let i = self.v6.partition_point(|r| r.end < ip);
        i < self.v6.len() && self.v6[i].start <= ip
    }
}
