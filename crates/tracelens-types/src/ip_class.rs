//! IPv4 address classification.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Classification bucket for an IPv4 address.
///
/// Only `Public` addresses qualify for ASN/geo enrichment; the remaining
/// buckets carry a matching hop tag instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IpClass {
    /// Globally routable
    Public,
    /// RFC 1918 (10/8, 172.16/12, 192.168/16)
    Private,
    /// Carrier-grade NAT (100.64.0.0/10)
    Cgnat,
    /// Localhost (127.0.0.0/8)
    Loopback,
    /// Link-local (169.254.0.0/16)
    LinkLocal,
    /// Multicast (224.0.0.0/4)
    Multicast,
    /// Other reserved ranges
    Reserved,
    /// Not a valid IPv4 address
    Unknown,
}

impl IpClass {
    /// Classifies an address string. Invalid input yields [`IpClass::Unknown`].
    #[must_use]
    pub fn of(ip: &str) -> Self {
        ip.parse::<Ipv4Addr>()
            .map_or(Self::Unknown, Self::of_addr)
    }

    /// Classifies a parsed address.
    ///
    /// Rules are evaluated in order: loopback, link-local, multicast,
    /// private, CGNAT, reserved, public.
    #[must_use]
    pub fn of_addr(addr: Ipv4Addr) -> Self {
        if addr.is_loopback() {
            Self::Loopback
        } else if addr.is_link_local() {
            Self::LinkLocal
        } else if addr.is_multicast() {
            Self::Multicast
        } else if addr.is_private() {
            Self::Private
        } else if is_cgnat(addr) {
            Self::Cgnat
        } else if is_rfc_reserved(addr) {
            Self::Reserved
        } else {
            Self::Public
        }
    }

    /// Whether the address is globally routable.
    #[must_use]
    pub fn is_public(self) -> bool {
        self == Self::Public
    }

    /// Whether ASN/geo/PTR enrichment should be attempted.
    #[must_use]
    pub fn should_enrich(self) -> bool {
        self.is_public()
    }

    /// Hop tag for non-public classes, `None` for public/multicast/unknown.
    #[must_use]
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::Private => Some("private"),
            Self::Cgnat => Some("cgnat"),
            Self::Loopback => Some("loopback"),
            Self::LinkLocal => Some("linklocal"),
            Self::Reserved => Some("reserved"),
            Self::Public | Self::Multicast | Self::Unknown => None,
        }
    }
}

/// 100.64.0.0/10 (RFC 6598).
fn is_cgnat(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 100 && (64..128).contains(&o[1])
}

/// Non-global ranges not covered by the specific buckets above: "this
/// network", IETF assignments, TEST-NETs, benchmarking, 6to4 relay
/// anycast, and class E including broadcast.
fn is_rfc_reserved(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 0
        || (o[0] == 192 && o[1] == 0 && o[2] == 0)
        || (o[0] == 192 && o[1] == 0 && o[2] == 2)
        || (o[0] == 192 && o[1] == 88 && o[2] == 99)
        || (o[0] == 198 && (o[1] == 18 || o[1] == 19))
        || (o[0] == 198 && o[1] == 51 && o[2] == 100)
        || (o[0] == 203 && o[1] == 0 && o[2] == 113)
        || o[0] >= 240
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_ranges() {
        assert_eq!(IpClass::of("127.0.0.1"), IpClass::Loopback);
        assert_eq!(IpClass::of("169.254.10.1"), IpClass::LinkLocal);
        assert_eq!(IpClass::of("224.0.0.251"), IpClass::Multicast);
        assert_eq!(IpClass::of("10.1.2.3"), IpClass::Private);
        assert_eq!(IpClass::of("172.16.0.1"), IpClass::Private);
        assert_eq!(IpClass::of("172.32.0.1"), IpClass::Public);
        assert_eq!(IpClass::of("192.168.1.1"), IpClass::Private);
        assert_eq!(IpClass::of("100.64.1.1"), IpClass::Cgnat);
        assert_eq!(IpClass::of("100.127.255.255"), IpClass::Cgnat);
        assert_eq!(IpClass::of("100.128.0.1"), IpClass::Public);
        assert_eq!(IpClass::of("198.18.0.1"), IpClass::Reserved);
        assert_eq!(IpClass::of("203.0.113.9"), IpClass::Reserved);
        assert_eq!(IpClass::of("240.0.0.1"), IpClass::Reserved);
        assert_eq!(IpClass::of("8.8.8.8"), IpClass::Public);
    }

    #[test]
    fn invalid_input_is_unknown() {
        assert_eq!(IpClass::of(""), IpClass::Unknown);
        assert_eq!(IpClass::of("not-an-ip"), IpClass::Unknown);
        assert_eq!(IpClass::of("1.2.3.4.5"), IpClass::Unknown);
    }

    #[test]
    fn only_public_is_enriched() {
        assert!(IpClass::of("8.8.8.8").should_enrich());
        assert!(!IpClass::of("100.64.1.1").should_enrich());
        assert!(!IpClass::of("192.168.0.1").should_enrich());
    }

    #[test]
    fn tags_match_class_names() {
        assert_eq!(IpClass::of("100.64.1.1").tag(), Some("cgnat"));
        assert_eq!(IpClass::of("169.254.0.1").tag(), Some("linklocal"));
        assert_eq!(IpClass::of("1.1.1.1").tag(), None);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(IpClass::LinkLocal.to_string(), "linklocal");
        assert_eq!(IpClass::Cgnat.to_string(), "cgnat");
    }
}
