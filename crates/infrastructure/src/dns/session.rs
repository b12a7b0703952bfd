use super::attempt::AttemptRecord;
use super::sender;
use super::transport::{SessionSocket, TcpChannel, UdpChannel};
use resolv_send_domain::{DomainError, ResolverConfig, ResolverOptions, Transport};
use std::net::SocketAddr;
use tracing::trace;

/// Owner of the persistent socket shared by consecutive send calls.
///
/// A session holds at most one live socket together with the transport and
/// name server it was opened for. Calls take `&mut self`, so a session has a
/// single writer; callers that share one across threads put it behind a lock,
/// or use one session each. Dropping the session closes the socket.
#[derive(Debug, Default)]
pub struct Session {
    socket: Option<SessionSocket>,
    attempts: Vec<AttemptRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `query` and writes the validated reply into `answer`.
    ///
    /// Returns the number of bytes written. See [`sender::send_query`].
    pub fn send(
        &mut self,
        config: &ResolverConfig,
        query: &[u8],
        answer: &mut [u8],
    ) -> Result<usize, DomainError> {
        sender::send_query(self, config, query, answer)
    }

    /// Returns a socket for `transport` to `server`, reusing the current one
    /// only on an exact match. Any other socket is closed first.
    pub fn acquire(
        &mut self,
        transport: Transport,
        server: SocketAddr,
    ) -> Result<&mut SessionSocket, DomainError> {
        let socket = match transport {
            Transport::Udp => SessionSocket::Udp(self.checkout_udp(server)?.0),
            Transport::Tcp => SessionSocket::Tcp(self.checkout_tcp(server)?.0),
        };
        Ok(self.socket.insert(socket))
    }

    /// Takes the socket out of the session for the length of one exchange.
    /// The flag tells whether an existing socket was reused.
    pub(crate) fn checkout_udp(&mut self, server: SocketAddr) -> Result<(UdpChannel, bool), DomainError> {
        match self.socket.take() {
            Some(SessionSocket::Udp(channel)) if channel.server() == server => {
                trace!(server = %server, "Reusing session UDP socket");
                Ok((channel, true))
            }
            stale => {
                Self::discard(stale);
                Ok((UdpChannel::open(server)?, false))
            }
        }
    }

    pub(crate) fn checkout_tcp(&mut self, server: SocketAddr) -> Result<(TcpChannel, bool), DomainError> {
        match self.socket.take() {
            Some(SessionSocket::Tcp(channel)) if channel.server() == server => {
                trace!(server = %server, "Reusing session virtual circuit");
                Ok((channel, true))
            }
            stale => {
                Self::discard(stale);
                Ok((TcpChannel::open(server)?, false))
            }
        }
    }

    pub(crate) fn restore_udp(&mut self, channel: UdpChannel) {
        self.socket = Some(SessionSocket::Udp(channel));
    }

    pub(crate) fn restore_tcp(&mut self, channel: TcpChannel) {
        self.socket = Some(SessionSocket::Tcp(channel));
    }

    fn discard(stale: Option<SessionSocket>) {
        if let Some(old) = stale {
            trace!(
                server = %old.server(),
                transport = old.protocol_name(),
                "Closing mismatched session socket"
            );
        }
    }

    /// Applies the close-on-return policy after a successful exchange.
    ///
    /// The socket survives only with `stay_open`, or when it is a virtual
    /// circuit to the first configured server in `use_vc` mode.
    pub fn release_if_appropriate(
        &mut self,
        transport: Transport,
        server_index: usize,
        options: &ResolverOptions,
    ) {
        let persistent_vc = transport == Transport::Tcp && server_index == 0 && options.use_vc;
        if !(persistent_vc || options.stay_open) {
            self.close();
        }
    }

    /// Closes any held socket regardless of policy.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            trace!(
                server = %socket.server(),
                transport = socket.protocol_name(),
                "Session socket closed"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Transport and server of the held socket, if any.
    pub fn current(&self) -> Option<(Transport, SocketAddr)> {
        self.socket.as_ref().map(|s| (s.transport(), s.server()))
    }

    /// Exchanges made by the most recent call, in order.
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub(crate) fn begin_call(&mut self) {
        self.attempts.clear();
    }

    pub(crate) fn record(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
