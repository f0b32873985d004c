//! Protocol-keyed factory over the probe engines.

use crate::icmp::IcmpEngine;
use crate::tcp::TcpEngine;
use crate::udp::UdpEngine;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracelens_types::{Error, ProbeOutcome, Protocol, Result};

/// The three probe variants behind one contract.
///
/// Sockets are opened at construction and released on drop; `probe` itself
/// never fails, it degrades to the empty outcome.
pub enum ProbeEngine {
    /// ICMP Echo engine
    Icmp(IcmpEngine),
    /// TCP SYN engine
    Tcp(TcpEngine),
    /// UDP high-port engine
    Udp(UdpEngine),
}

impl ProbeEngine {
    /// Constructs the engine for a protocol. `port` applies to TCP only;
    /// UDP probes the conventional high-port window.
    pub fn new(protocol: Protocol, port: u16, timeout: Duration) -> Result<Self> {
        if !cfg!(unix) {
            return Err(Error::unsupported(
                "raw-socket probing",
                std::env::consts::OS,
            ));
        }
        match protocol {
            Protocol::Icmp => IcmpEngine::new(timeout).map(Self::Icmp),
            Protocol::Tcp => TcpEngine::new(port, timeout).map(Self::Tcp),
            Protocol::Udp => UdpEngine::new(timeout).map(Self::Udp),
        }
    }

    /// Emits one TTL-limited probe toward the target.
    pub fn probe(&mut self, target: Ipv4Addr, ttl: u8) -> ProbeOutcome {
        match self {
            Self::Icmp(engine) => engine.probe(target, ttl),
            Self::Tcp(engine) => engine.probe(target, ttl),
            Self::Udp(engine) => engine.probe(target, ttl),
        }
    }
}
