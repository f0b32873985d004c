//! ICMP Echo probe engine.

use crate::packet::{self, IcmpView};
use crate::sock::{self, recv_correlated};
use std::net::{Ipv4Addr, UdpSocket};
use std::time::{Duration, Instant};
use tracelens_types::{ProbeOutcome, Result};

/// Probe engine sending ICMP Echo Requests with a limited TTL.
///
/// The echo identifier is the process id masked to 16 bits; the sequence
/// number increments per probe so each attempt correlates unambiguously.
pub struct IcmpEngine {
    socket: UdpSocket,
    identifier: u16,
    sequence: u16,
    timeout: Duration,
}

impl IcmpEngine {
    /// Opens the raw ICMP socket. Fails only for missing privileges or
    /// other socket-creation errors.
    pub fn new(timeout: Duration) -> Result<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let identifier = (std::process::id() & 0xffff) as u16;
        Ok(Self {
            socket: sock::raw_icmp_socket()?,
            identifier,
            sequence: 0,
            timeout,
        })
    }

    /// Sends one Echo Request with the given TTL and waits for a correlated
    /// response. Any I/O failure yields the empty (timeout) outcome.
    pub fn probe(&mut self, target: Ipv4Addr, ttl: u8) -> ProbeOutcome {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;
        let identifier = self.identifier;

        if self.socket.set_ttl(u32::from(ttl)).is_err() {
            return ProbeOutcome::timeout();
        }
        let echo = packet::build_echo_request(identifier, sequence, sock::now_micros());
        let send_time = Instant::now();
        if self.socket.send_to(&echo, (target, 0)).is_err() {
            return ProbeOutcome::timeout();
        }

        recv_correlated(
            &self.socket,
            send_time,
            self.timeout,
            |datagram, responder, rtt_ms| correlate(datagram, responder, identifier, sequence, rtt_ms),
        )
    }
}

/// Matches a received datagram against the outstanding Echo Request.
///
/// Echo Replies must carry our identifier and sequence directly; Time
/// Exceeded and Destination Unreachable must embed an Echo Request carrying
/// them. Everything else is foreign and left for the loop to discard.
fn correlate(
    datagram: &[u8],
    responder: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    rtt_ms: f64,
) -> Option<ProbeOutcome> {
    let view = IcmpView::from_datagram(datagram)?;
    match view.kind() {
        packet::ECHO_REPLY => (view.echo_identifier() == identifier
            && view.echo_sequence() == sequence)
            .then(|| ProbeOutcome::reply(responder, rtt_ms, true)),
        kind @ (packet::TIME_EXCEEDED | packet::DEST_UNREACHABLE) => {
            let embedded = view.embedded()?;
            let ours = embedded.protocol() == packet::PROTO_ICMP
                && embedded.icmp_type() == packet::ECHO_REQUEST
                && embedded.icmp_identifier() == identifier
                && embedded.icmp_sequence() == sequence;
            ours.then(|| ProbeOutcome::reply(responder, rtt_ms, kind == packet::DEST_UNREACHABLE))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONDER: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 1);

    fn echo_reply(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        let mut reply = packet::build_echo_request(identifier, sequence, 0);
        reply[0] = packet::ECHO_REPLY;
        datagram.extend_from_slice(&reply);
        datagram
    }

    fn icmp_error(kind: u8, identifier: u16, sequence: u16) -> Vec<u8> {
        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        datagram.extend_from_slice(&[kind, 0, 0, 0, 0, 0, 0, 0]);
        let inner_ip = packet::build_ipv4_header(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(8, 8, 8, 8),
            1,
            0,
            packet::PROTO_ICMP,
            16,
        );
        datagram.extend_from_slice(&inner_ip);
        datagram.extend_from_slice(&packet::build_echo_request(identifier, sequence, 0));
        datagram
    }

    #[test]
    fn echo_reply_with_matching_ids_is_terminal() {
        let outcome = correlate(&echo_reply(0x1111, 5), RESPONDER, 0x1111, 5, 12.0).unwrap();
        assert_eq!(outcome.responder, Some(RESPONDER));
        assert!(outcome.terminal);
    }

    #[test]
    fn echo_reply_with_foreign_sequence_is_discarded() {
        assert!(correlate(&echo_reply(0x1111, 6), RESPONDER, 0x1111, 5, 12.0).is_none());
    }

    #[test]
    fn time_exceeded_with_our_embedded_probe_is_intermediate() {
        let datagram = icmp_error(packet::TIME_EXCEEDED, 0x2222, 9);
        let outcome = correlate(&datagram, RESPONDER, 0x2222, 9, 30.0).unwrap();
        assert!(!outcome.terminal);
        assert_eq!(outcome.rtt_ms, Some(30.0));
    }

    #[test]
    fn time_exceeded_with_foreign_identifier_is_discarded() {
        let datagram = icmp_error(packet::TIME_EXCEEDED, 0x3333, 9);
        assert!(correlate(&datagram, RESPONDER, 0x2222, 9, 30.0).is_none());
    }

    #[test]
    fn dest_unreachable_with_our_embedded_probe_is_terminal() {
        let datagram = icmp_error(packet::DEST_UNREACHABLE, 0x2222, 9);
        let outcome = correlate(&datagram, RESPONDER, 0x2222, 9, 30.0).unwrap();
        assert!(outcome.terminal);
    }

    #[test]
    fn truncated_error_message_is_discarded() {
        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        datagram.extend_from_slice(&[packet::TIME_EXCEEDED, 0, 0, 0, 0, 0, 0, 0]);
        assert!(correlate(&datagram, RESPONDER, 1, 1, 1.0).is_none());
    }
}
