//! Enrichment data attached to hops.

use crate::hop::{fold_rtts, rtt_mean, RawHop};
use crate::ip_class::IpClass;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Geographic information for an address. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// Country name
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    pub country_code: Option<String>,
    /// City name
    pub city: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lon: Option<f64>,
}

impl GeoInfo {
    /// Creates a record carrying only a country code, used as the
    /// last-resort fallback when geolocation fails but the ASN origin
    /// record knows the registration country.
    #[must_use]
    pub fn from_country_code(code: impl Into<String>) -> Self {
        Self {
            country_code: Some(code.into()),
            ..Self::default()
        }
    }
}

/// Autonomous-system information for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnInfo {
    /// Textual ASN identifier, e.g. "AS15169"
    pub asn: String,
    /// Organization description
    pub org: Option<String>,
    /// Announced prefix covering the address
    pub prefix: Option<String>,
    /// Registration country code
    pub country: Option<String>,
}

/// A hop augmented with enrichment data and diagnostic tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedHop {
    /// Hop number (TTL)
    pub hop: u8,
    /// Responder address, if any probe was answered
    pub ip: Option<Ipv4Addr>,
    /// Per-probe RTTs in send order
    pub rtts: Vec<Option<f64>>,
    /// Reverse-DNS hostname
    pub ptr: Option<String>,
    /// ASN identifier ("AS" + number)
    pub asn: Option<String>,
    /// Organization description
    pub org: Option<String>,
    /// Geolocation
    pub geo: Option<GeoInfo>,
    /// IP classification bucket
    pub ip_class: Option<IpClass>,
    /// Diagnostic labels
    pub tags: Vec<String>,
    /// Whether the target answered at this hop
    pub reached: bool,
}

impl EnrichedHop {
    /// Builds the enrichment carrier from a raw hop.
    #[must_use]
    pub fn from_raw(raw: &RawHop) -> Self {
        Self {
            hop: raw.ttl,
            ip: raw.responder,
            rtts: raw.rtts.clone(),
            ptr: None,
            asn: None,
            org: None,
            geo: None,
            ip_class: None,
            tags: Vec::new(),
            reached: raw.reached,
        }
    }

    /// Minimum RTT over the probes that answered.
    #[must_use]
    pub fn rtt_min(&self) -> Option<f64> {
        fold_rtts(&self.rtts, f64::min)
    }

    /// Maximum RTT over the probes that answered.
    #[must_use]
    pub fn rtt_max(&self) -> Option<f64> {
        fold_rtts(&self.rtts, f64::max)
    }

    /// Mean RTT over the probes that answered.
    #[must_use]
    pub fn rtt_avg(&self) -> Option<f64> {
        rtt_mean(&self.rtts)
    }

    /// Whether every probe for this hop timed out.
    #[must_use]
    pub fn all_timeout(&self) -> bool {
        self.rtts.iter().all(Option::is_none)
    }

    /// Appends a tag unless already present.
    pub fn tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}
