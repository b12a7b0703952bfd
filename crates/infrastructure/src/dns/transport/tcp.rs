use super::framing::{self, FramedReply};
use resolv_send_domain::{DomainError, IoStep};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpStream};
use tracing::trace;

/// A virtual circuit to one name server.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    server: SocketAddr,
}

impl TcpChannel {
    pub fn open(server: SocketAddr) -> Result<Self, DomainError> {
        let socket = Socket::new(Domain::for_address(server), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| DomainError::SocketCreateFailed {
                transport: "TCP",
                server,
                reason: e.to_string(),
            })?;

        socket
            .connect(&server.into())
            .map_err(|e| DomainError::from_io(IoStep::Connect, server, &e))?;

        let stream: TcpStream = socket.into();
        stream.set_nodelay(true).map_err(|e| DomainError::ConnectFailed {
            server,
            reason: format!("Failed to set TCP_NODELAY: {}", e),
        })?;

        trace!(server = %server, "TCP connection established");

        Ok(Self { stream, server })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn send(&mut self, query: &[u8]) -> Result<usize, DomainError> {
        framing::write_frame(&mut self.stream, query, self.server)
    }

    pub fn read_length(&mut self) -> Result<usize, DomainError> {
        framing::read_length_prefix(&mut self.stream, self.server)
    }

    pub fn read_body(&mut self, declared: usize, buf: &mut [u8]) -> Result<FramedReply, DomainError> {
        framing::read_body(&mut self.stream, declared, buf, self.server)
    }
}
