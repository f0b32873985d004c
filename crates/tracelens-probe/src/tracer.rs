//! Traceroute orchestration: drives probes across TTLs.

use crate::engine::ProbeEngine;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracelens_types::{Error, Protocol, RawHop, Result};
use tracing::debug;

/// Traceroute configuration.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Protocol to probe with
    pub protocol: Protocol,
    /// Maximum number of hops
    pub max_hops: u8,
    /// Number of probes per hop
    pub probes_per_hop: u8,
    /// Timeout per probe
    pub timeout: Duration,
    /// Destination port for TCP probes
    pub port: u16,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Icmp,
            max_hops: 30,
            probes_per_hop: 3,
            timeout: Duration::from_secs(2),
            port: 80,
        }
    }
}

/// Drives `probes_per_hop` sequential probes across TTLs 1..=max_hops,
/// streaming each completed hop and stopping once the target answers.
pub struct Tracer {
    config: TraceConfig,
}

impl Tracer {
    /// Creates a tracer with the given configuration.
    #[must_use]
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }

    /// The configuration this tracer runs with.
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Resolves a target name to its first IPv4 address via the system
    /// resolver.
    pub fn resolve(target: &str) -> Result<Ipv4Addr> {
        let addrs = (target, 0u16)
            .to_socket_addrs()
            .map_err(|e| Error::resolve_failed(target, e.to_string()))?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| Error::resolve_failed(target, "no IPv4 address"))
    }

    /// Executes the trace toward an already-resolved target.
    ///
    /// `on_hop` fires exactly once per hop, in TTL order, before the next
    /// TTL begins probing. The cancel flag is honoured at probe boundaries;
    /// a partially probed hop is discarded on cancellation.
    pub fn trace<F>(
        &self,
        target: Ipv4Addr,
        cancel: &AtomicBool,
        mut on_hop: F,
    ) -> Result<Vec<RawHop>>
    where
        F: FnMut(&RawHop),
    {
        let mut engine = ProbeEngine::new(self.config.protocol, self.config.port, self.config.timeout)?;
        let mut hops = Vec::new();

        'ttl: for ttl in 1..=self.config.max_hops {
            let mut rtts = Vec::with_capacity(usize::from(self.config.probes_per_hop));
            let mut responder = None;
            let mut reached = false;

            for attempt in 0..self.config.probes_per_hop {
                if cancel.load(Ordering::Relaxed) {
                    debug!(ttl, attempt, "trace cancelled");
                    break 'ttl;
                }
                let outcome = engine.probe(target, ttl);
                rtts.push(outcome.rtt_ms);
                // Last responder wins when probes disagree.
                if outcome.responder.is_some() {
                    responder = outcome.responder;
                }
                if outcome.terminal {
                    reached = true;
                }
            }

            let hop = RawHop {
                ttl,
                responder,
                rtts,
                reached,
            };
            debug!(ttl, responder = ?hop.responder, reached, "hop complete");
            on_hop(&hop);
            hops.push(hop);

            if reached {
                break;
            }
        }

        Ok(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_accepts_ip_literal() {
        assert_eq!(
            Tracer::resolve("127.0.0.1").unwrap(),
            Ipv4Addr::new(127, 0, 0, 1)
        );
    }

    #[test]
    fn resolve_rejects_nonsense() {
        let err = Tracer::resolve("definitely-not-a-real-host.invalid.").unwrap_err();
        assert!(matches!(err, Error::ResolveFailed { .. }));
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let config = TraceConfig::default();
        assert_eq!(config.max_hops, 30);
        assert_eq!(config.probes_per_hop, 3);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.port, 80);
        assert_eq!(config.protocol, Protocol::Icmp);
    }
}
