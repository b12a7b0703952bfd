//! UDP channel for DNS queries (RFC 1035 §4.2.1)
//!
//! Messages are sent as-is (no framing). The socket is connected to the
//! name server, so the kernel drops datagrams from any other source and ICMP
//! errors surface on the next receive.

use resolv_send_domain::{DomainError, IoStep};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;
use tracing::trace;

#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    server: SocketAddr,
}

impl UdpChannel {
    pub fn open(server: SocketAddr) -> Result<Self, DomainError> {
        let socket = Socket::new(Domain::for_address(server), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| DomainError::SocketCreateFailed {
                transport: "UDP",
                server,
                reason: e.to_string(),
            })?;

        socket
            .connect(&server.into())
            .map_err(|e| DomainError::from_io(IoStep::Connect, server, &e))?;

        trace!(server = %server, "UDP socket connected");

        Ok(Self {
            socket: socket.into(),
            server,
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Sends the whole query as one datagram.
    pub fn send(&self, query: &[u8]) -> Result<usize, DomainError> {
        let sent = self
            .socket
            .send(query)
            .map_err(|e| DomainError::from_io(IoStep::Write, self.server, &e))?;

        if sent != query.len() {
            return Err(DomainError::ShortWrite {
                server: self.server,
                written: sent,
                expected: query.len(),
            });
        }

        Ok(sent)
    }

    /// Blocks until a datagram is queued or `deadline` passes.
    ///
    /// Returns `Ok(false)` on timeout. `scratch` is only used as the peek
    /// target; the datagram stays queued for [`UdpChannel::recv`].
    pub fn wait_readable(&self, deadline: Instant, scratch: &mut [u8]) -> Result<bool, DomainError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            self.socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| DomainError::from_io(IoStep::Read, self.server, &e))?;

            match readiness(self.socket.peek(scratch)) {
                Ok(Readiness::Ready) => return Ok(true),
                Ok(Readiness::TimedOut) => return Ok(false),
                Ok(Readiness::Interrupted) => continue,
                Err(e) => return Err(DomainError::from_io(IoStep::Read, self.server, &e)),
            }
        }
    }

    /// Receives one queued datagram into `buf`. Anything beyond `buf.len()`
    /// is discarded by the kernel.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, DomainError> {
        self.socket
            .recv(buf)
            .map_err(|e| DomainError::from_io(IoStep::Read, self.server, &e))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Readiness {
    Ready,
    TimedOut,
    /// A signal cut the wait short; wait again for what is left.
    Interrupted,
}

fn readiness(peeked: io::Result<usize>) -> io::Result<Readiness> {
    match peeked {
        Ok(_) => Ok(Readiness::Ready),
        Err(e) => match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Ok(Readiness::TimedOut),
            io::ErrorKind::Interrupted => Ok(Readiness::Interrupted),
            _ => Err(e),
        },
    }
}
