//! Trace report and diagnosis types.

use crate::enrichment::EnrichedHop;
use crate::error::Error;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Probe protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// ICMP Echo
    #[default]
    Icmp,
    /// TCP SYN
    Tcp,
    /// UDP to high ports
    Udp,
}

impl Protocol {
    /// Whether this protocol addresses a destination port.
    #[must_use]
    pub fn uses_port(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(Self::Icmp),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(Error::ProtocolUnsupported {
                name: s.to_string(),
            }),
        }
    }
}

/// Complete result of one trace run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    /// Target as given on the command line
    pub target: String,
    /// Resolved target address
    pub resolved_ip: Ipv4Addr,
    /// Protocol used
    pub protocol: Protocol,
    /// Destination port for TCP/UDP
    pub port: Option<u16>,
    /// Trace start time
    pub timestamp: DateTime<Local>,
    /// Enriched hops in TTL order
    pub hops: Vec<EnrichedHop>,
    /// Whether the target answered
    pub reachable: bool,
    /// Number of hops discovered
    pub total_hops: usize,
}

impl TraceReport {
    /// Mean RTT of the final hop, if it answered.
    #[must_use]
    pub fn final_rtt(&self) -> Option<f64> {
        self.hops.last().and_then(EnrichedHop::rtt_avg)
    }
}

/// A significant RTT increase between consecutive responsive hops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyJump {
    /// Hop where the increase was observed
    pub hop: u8,
    /// RTT delta in milliseconds (rounded to one decimal)
    pub delta_ms: f64,
}

/// Diagnostic summary assembled after the trace completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Whether the target answered
    pub reachable: bool,
    /// Number of hops discovered
    pub total_hops: usize,
    /// Mean RTT of the final hop
    pub avg_rtt: Option<f64>,
    /// TTLs of silent hops followed by later responses
    pub filtered_hops: Vec<u8>,
    /// Latency discontinuities at or above the jump threshold
    pub latency_jumps: Vec<LatencyJump>,
    /// First hop whose delta met the egress threshold
    pub egress_hop: Option<u8>,
    /// Human-readable issue summaries
    pub issues: Vec<String>,
}
