//! Raw socket construction and the shared receive loop.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracelens_types::{Error, ProbeOutcome, Result};

/// Largest datagram the receive loops accept.
pub(crate) const MAX_DATAGRAM: usize = 1024;

/// Opens a raw socket for sending and receiving ICMP.
///
/// Requires `CAP_NET_RAW` or root; a permission failure is surfaced as the
/// distinguished privilege error.
pub(crate) fn raw_icmp_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
        .map_err(|e| map_privilege(e, "raw ICMP socket"))?;
    Ok(socket.into())
}

/// Opens a raw TCP socket with `IP_HDRINCL` set, for header-included sends.
pub(crate) fn raw_tcp_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::TCP))
        .map_err(|e| map_privilege(e, "raw TCP socket"))?;
    socket.set_header_included(true)?;
    Ok(socket.into())
}

fn map_privilege(err: io::Error, operation: &str) -> Error {
    if err.kind() == io::ErrorKind::PermissionDenied {
        Error::privilege_denied(operation, "root privileges")
    } else {
        Error::Io(err)
    }
}

/// Discovers the local source address the kernel routes toward `target` by
/// connecting a dummy UDP socket. No packets are transmitted.
pub(crate) fn discover_local_addr(target: Ipv4Addr) -> Option<Ipv4Addr> {
    let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    probe.connect((target, 80)).ok()?;
    match probe.local_addr().ok()? {
        SocketAddr::V4(addr) => Some(*addr.ip()),
        SocketAddr::V6(_) => None,
    }
}

/// Microseconds since the UNIX epoch, for probe payload timestamps.
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
}

/// Deadline-bounded receive loop shared by the engines.
///
/// Reads datagrams until `correlate` claims one or `send_time + timeout`
/// passes. The socket timeout is re-armed to the remaining budget after
/// every uncorrelated datagram so stray traffic cannot extend the wait.
pub(crate) fn recv_correlated<F>(
    socket: &UdpSocket,
    send_time: Instant,
    timeout: Duration,
    mut correlate: F,
) -> ProbeOutcome
where
    F: FnMut(&[u8], Ipv4Addr, f64) -> Option<ProbeOutcome>,
{
    let deadline = send_time + timeout;
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return ProbeOutcome::timeout();
        };
        if remaining.is_zero() || socket.set_read_timeout(Some(remaining)).is_err() {
            return ProbeOutcome::timeout();
        }
        match socket.recv_from(&mut buf) {
            Ok((len, SocketAddr::V4(from))) => {
                let rtt_ms = send_time.elapsed().as_secs_f64() * 1000.0;
                if let Some(outcome) = correlate(&buf[..len], *from.ip(), rtt_ms) {
                    return outcome;
                }
            }
            Ok((_, SocketAddr::V6(_))) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return ProbeOutcome::timeout();
            }
            Err(_) => return ProbeOutcome::timeout(),
        }
    }
}
