//! UDP high-port probe engine (classic Unix traceroute).
//!
//! Sends UDP datagrams to a rotating window of high ports. Intermediate
//! routers answer with Time Exceeded; the destination answers with Port
//! Unreachable, which signals arrival.

use crate::packet::{self, IcmpView};
use crate::sock::{self, recv_correlated};
use std::net::{Ipv4Addr, UdpSocket};
use std::time::{Duration, Instant};
use tracelens_types::{ProbeOutcome, Result};
use tracing::debug;

/// First destination port of the probing window.
pub const DEFAULT_BASE_PORT: u16 = 33434;

/// Number of ports the destination rotates through.
const PORT_WINDOW: u16 = 30;

/// Probe engine sending UDP datagrams to high ports with a limited TTL.
pub struct UdpEngine {
    udp: UdpSocket,
    recv: UdpSocket,
    base_port: u16,
    offset: u16,
    timeout: Duration,
}

impl UdpEngine {
    /// Opens the send and raw receive sockets with the default base port.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_port(DEFAULT_BASE_PORT, timeout)
    }

    /// Opens the sockets probing from the given base port.
    pub fn with_base_port(base_port: u16, timeout: Duration) -> Result<Self> {
        let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        Ok(Self {
            udp,
            recv: sock::raw_icmp_socket()?,
            base_port,
            offset: 0,
            timeout,
        })
    }

    /// Sends one datagram with the given TTL and waits for a correlated
    /// ICMP response. Any I/O failure yields the empty (timeout) outcome.
    pub fn probe(&mut self, target: Ipv4Addr, ttl: u8) -> ProbeOutcome {
        if self.udp.set_ttl(u32::from(ttl)).is_err() {
            return ProbeOutcome::timeout();
        }
        let dst_port = self.base_port + self.offset;
        self.offset = (self.offset + 1) % PORT_WINDOW;

        // The payload echoes destination port and TTL so the quoted copy in
        // an ICMP error stays matchable even under aggressive truncation.
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&dst_port.to_be_bytes());
        payload.extend_from_slice(&u16::from(ttl).to_be_bytes());
        #[allow(clippy::cast_possible_truncation)]
        payload.extend_from_slice(&((sock::now_micros() / 1_000_000) as u32).to_be_bytes());

        let send_time = Instant::now();
        if self.udp.send_to(&payload, (target, dst_port)).is_err() {
            return ProbeOutcome::timeout();
        }

        let base_port = self.base_port;
        recv_correlated(
            &self.recv,
            send_time,
            self.timeout,
            |datagram, responder, rtt_ms| correlate(datagram, responder, target, base_port, rtt_ms),
        )
    }
}

/// Verifies the embedded datagram: destination must be the target, protocol
/// UDP, destination port within the probing window. Time Exceeded marks an
/// intermediate hop; any Destination Unreachable marks arrival (Port
/// Unreachable is the classical signal, other codes still mean the host
/// answered).
fn correlate(
    datagram: &[u8],
    responder: Ipv4Addr,
    target: Ipv4Addr,
    base_port: u16,
    rtt_ms: f64,
) -> Option<ProbeOutcome> {
    let view = IcmpView::from_datagram(datagram)?;
    let terminal = match view.kind() {
        packet::TIME_EXCEEDED => false,
        packet::DEST_UNREACHABLE => true,
        _ => return None,
    };
    let embedded = view.embedded()?;
    let ours = embedded.protocol() == packet::PROTO_UDP
        && embedded.dst_addr() == target
        && (base_port..base_port + PORT_WINDOW).contains(&embedded.dst_port());
    if ours && terminal && view.code() != packet::PORT_UNREACHABLE {
        debug!(code = view.code(), "destination unreachable with non-port code");
    }
    ours.then(|| ProbeOutcome::reply(responder, rtt_ms, terminal))
}
