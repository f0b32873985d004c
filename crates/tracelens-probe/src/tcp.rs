//! TCP SYN probe engine.
//!
//! Useful when ICMP is filtered but TCP ports are open. The SYN datagram is
//! built from scratch over a header-included raw socket; responses arrive
//! as ICMP on a separate raw socket.

use crate::packet::{self, IcmpView};
use crate::sock::{self, recv_correlated};
use rand::Rng;
use std::net::{Ipv4Addr, UdpSocket};
use std::time::{Duration, Instant};
use tracelens_types::{ProbeOutcome, Result};

/// Lowest ephemeral source port drawn for outgoing SYNs.
const SRC_PORT_MIN: u16 = 32768;
/// Highest ephemeral source port; the rotation wraps back to the minimum.
const SRC_PORT_MAX: u16 = 60999;

/// Probe engine sending TCP SYN segments with a limited TTL.
pub struct TcpEngine {
    send: UdpSocket,
    recv: UdpSocket,
    port: u16,
    src_port: u16,
    timeout: Duration,
}

impl TcpEngine {
    /// Opens the raw send and receive sockets. Fails only for missing
    /// privileges or other socket-creation errors.
    pub fn new(port: u16, timeout: Duration) -> Result<Self> {
        Ok(Self {
            send: sock::raw_tcp_socket()?,
            recv: sock::raw_icmp_socket()?,
            port,
            src_port: rand::thread_rng().gen_range(SRC_PORT_MIN..=SRC_PORT_MAX),
            timeout,
        })
    }

    /// Rotates within 32768..=60999, wrapping to the low end.
    fn next_src_port(&mut self) -> u16 {
        self.src_port = if self.src_port >= SRC_PORT_MAX {
            SRC_PORT_MIN
        } else {
            self.src_port + 1
        };
        self.src_port
    }

    /// Sends one SYN with the given TTL and waits for a correlated ICMP
    /// response. Any I/O failure yields the empty (timeout) outcome.
    pub fn probe(&mut self, target: Ipv4Addr, ttl: u8) -> ProbeOutcome {
        let src_ip = sock::discover_local_addr(target).unwrap_or(Ipv4Addr::UNSPECIFIED);
        let src_port = self.next_src_port();

        let mut rng = rand::thread_rng();
        let tcp = packet::build_tcp_syn(src_ip, target, src_port, self.port, rng.gen());
        let ip = packet::build_ipv4_header(src_ip, target, ttl, rng.gen(), packet::PROTO_TCP, tcp.len());

        let mut datagram = Vec::with_capacity(ip.len() + tcp.len());
        datagram.extend_from_slice(&ip);
        datagram.extend_from_slice(&tcp);

        let send_time = Instant::now();
        if self.send.send_to(&datagram, (target, self.port)).is_err() {
            return ProbeOutcome::timeout();
        }

        let dst_port = self.port;
        recv_correlated(
            &self.recv,
            send_time,
            self.timeout,
            |datagram, responder, rtt_ms| correlate(datagram, responder, target, dst_port, rtt_ms),
        )
    }
}

/// Accepts only Time Exceeded / Destination Unreachable whose embedded
/// datagram is TCP toward our destination port. Terminal iff the responder
/// is the target itself.
fn correlate(
    datagram: &[u8],
    responder: Ipv4Addr,
    target: Ipv4Addr,
    dst_port: u16,
    rtt_ms: f64,
) -> Option<ProbeOutcome> {
    let view = IcmpView::from_datagram(datagram)?;
    if !matches!(view.kind(), packet::TIME_EXCEEDED | packet::DEST_UNREACHABLE) {
        return None;
    }
    let embedded = view.embedded()?;
    (embedded.protocol() == packet::PROTO_TCP && embedded.dst_port() == dst_port)
        .then(|| ProbeOutcome::reply(responder, rtt_ms, responder == target))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);
    const ROUTER: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

    fn icmp_error(kind: u8, protocol: u8, dst_port: u16) -> Vec<u8> {
        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        datagram.extend_from_slice(&[kind, 0, 0, 0, 0, 0, 0, 0]);
        let inner_ip = packet::build_ipv4_header(
            Ipv4Addr::new(10, 0, 0, 2),
            TARGET,
            1,
            0,
            protocol,
            20,
        );
        datagram.extend_from_slice(&inner_ip);
        datagram.extend_from_slice(&40000u16.to_be_bytes()); // src port
        datagram.extend_from_slice(&dst_port.to_be_bytes());
        datagram.extend_from_slice(&[0, 0, 0, 0]); // rest of the quoted header
        datagram
    }

    #[test]
    fn time_exceeded_from_router_is_intermediate() {
        let datagram = icmp_error(packet::TIME_EXCEEDED, packet::PROTO_TCP, 443);
        let outcome = correlate(&datagram, ROUTER, TARGET, 443, 18.0).unwrap();
        assert_eq!(outcome.responder, Some(ROUTER));
        assert!(!outcome.terminal);
    }

    #[test]
    fn response_from_target_is_terminal() {
        let datagram = icmp_error(packet::DEST_UNREACHABLE, packet::PROTO_TCP, 443);
        let outcome = correlate(&datagram, TARGET, TARGET, 443, 18.0).unwrap();
        assert!(outcome.terminal);
    }

    #[test]
    fn foreign_destination_port_is_discarded() {
        let datagram = icmp_error(packet::TIME_EXCEEDED, packet::PROTO_TCP, 8080);
        assert!(correlate(&datagram, ROUTER, TARGET, 443, 18.0).is_none());
    }

    #[test]
    fn non_tcp_embedded_protocol_is_discarded() {
        let datagram = icmp_error(packet::TIME_EXCEEDED, packet::PROTO_UDP, 443);
        assert!(correlate(&datagram, ROUTER, TARGET, 443, 18.0).is_none());
    }

    #[test]
    fn source_port_rotation_stays_in_range() {
        // Walk the rotation far enough to wrap.
        let mut port = SRC_PORT_MAX - 2;
        for _ in 0..6 {
            port = if port >= SRC_PORT_MAX { SRC_PORT_MIN } else { port + 1 };
            assert!((SRC_PORT_MIN..=SRC_PORT_MAX).contains(&port));
        }
        assert_eq!(port, SRC_PORT_MIN + 3);
    }
}
