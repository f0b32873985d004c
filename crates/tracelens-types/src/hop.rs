//! Raw probing result types.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Result of a single TTL-limited probe.
///
/// An absent responder means the probe timed out; `rtt_ms` is present iff
/// the responder is. `terminal` indicates the response signalled arrival at
/// the target (Echo Reply, or a Destination Unreachable from the target).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// The address that answered, if any.
    pub responder: Option<Ipv4Addr>,
    /// Round-trip time in milliseconds, if an answer arrived.
    pub rtt_ms: Option<f64>,
    /// Whether the response indicates the target was reached.
    pub terminal: bool,
}

impl ProbeOutcome {
    /// Creates a timed-out (empty) outcome.
    #[must_use]
    pub fn timeout() -> Self {
        Self::default()
    }

    /// Creates an outcome for a correlated response.
    #[must_use]
    pub fn reply(responder: Ipv4Addr, rtt_ms: f64, terminal: bool) -> Self {
        Self {
            responder: Some(responder),
            rtt_ms: Some(rtt_ms),
            terminal,
        }
    }
}

/// Aggregate of all probe attempts for one TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHop {
    /// Hop number (the TTL used)
    pub ttl: u8,
    /// Responder address: the last non-absent responder across attempts
    pub responder: Option<Ipv4Addr>,
    /// Per-probe RTTs in send order; `None` marks a timeout
    pub rtts: Vec<Option<f64>>,
    /// Whether any attempt was terminal
    pub reached: bool,
}

impl RawHop {
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
}

pub(crate) fn fold_rtts(rtts: &[Option<f64>], pick: fn(f64, f64) -> f64) -> Option<f64> {
    rtts.iter().flatten().copied().reduce(pick)
}

pub(crate) fn rtt_mean(rtts: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = rtts.iter().flatten().copied().collect();
    if valid.is_empty() {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        Some(mean)
    }
}
