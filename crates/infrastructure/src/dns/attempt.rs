//! One (try, server) exchange, driven as a small state machine.
//!
//! ```text
//! SelectTransport -> Send -> Wait -> ReceiveUdp -> Validate -> done
//!                         \-> ReceiveTcp ---------/
//! Validate --(wrong id, UDP)--> Wait            same socket, same deadline
//! Validate --(TC set, UDP)----> Escalate -> Send(Tcp)
//! Send/ReceiveTcp --(reset)---> ReconnectAfterReset -> Send(Tcp)
//! ```
//!
//! States that hold a socket own it. A clean finish hands the socket back to
//! the session for reuse; an I/O error drops it.

use super::sender::duration_millis;
use super::session::Session;
use super::transport::{TcpChannel, UdpChannel};
use resolv_send_domain::dns_header::{self, PACKET_SZ};
use resolv_send_domain::{DomainError, ResolverConfig, Transport};
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// Upper bound for a deadline when the scheduled wait overflows `Instant`.
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How a single exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Answered { len: usize },
    /// No acceptable UDP reply before the deadline.
    TimedOut,
    /// A virtual circuit returned a reply for another query.
    Mismatched,
    /// Truncated UDP reply; the same server is retried over TCP.
    Truncated,
    /// Connection reset; the same server gets one reconnect.
    Reset(DomainError),
    Failed(DomainError),
}

/// One exchange made during a send call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub try_index: u32,
    pub server_index: usize,
    pub server: SocketAddr,
    pub transport: Transport,
    /// Wait budget; virtual circuits are not bounded.
    pub timeout: Option<Duration>,
    /// Replies thrown away for carrying the wrong transaction ID.
    pub discarded: usize,
    pub outcome: AttemptOutcome,
}

/// State shared by every attempt of one send call.
#[derive(Debug)]
pub(crate) struct CallState {
    /// Set once a truncated UDP reply is seen; sticks for the rest of the call.
    pub force_tcp: bool,
    reset_retried: Vec<bool>,
    /// Whether any query left this host.
    pub sent_any: bool,
    pub last_error: Option<DomainError>,
}

impl CallState {
    pub fn new(server_count: usize) -> Self {
        Self {
            force_tcp: false,
            reset_retried: vec![false; server_count],
            sent_any: false,
            last_error: None,
        }
    }

    /// Classifies an exhausted call. In stream-only mode the last concrete
    /// transport error is more useful than the coarse classification.
    pub fn into_error(self, vc_throughout: bool) -> DomainError {
        match self.last_error {
            Some(err) if vc_throughout => err,
            _ if !self.sent_any => DomainError::NoServerReachable,
            _ => DomainError::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptPlan {
    pub try_index: u32,
    pub server_index: usize,
    pub server: SocketAddr,
    pub udp_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Answered { len: usize, transport: Transport },
    NextServer,
}

enum AttemptState {
    SelectTransport,
    Send(Transport),
    Wait {
        channel: UdpChannel,
        deadline: Instant,
    },
    ReceiveUdp {
        channel: UdpChannel,
        deadline: Instant,
    },
    ReceiveTcp {
        channel: TcpChannel,
        reused: bool,
    },
    Validate {
        socket: Held,
        len: usize,
    },
    Escalate,
    ReconnectAfterReset,
}

/// Socket carried into validation; UDP keeps its deadline for re-waiting.
enum Held {
    Udp {
        channel: UdpChannel,
        deadline: Instant,
    },
    Tcp(TcpChannel),
}

impl Held {
    fn transport(&self) -> Transport {
        match self {
            Held::Udp { .. } => Transport::Udp,
            Held::Tcp(_) => Transport::Tcp,
        }
    }
}

type Transition = ControlFlow<Verdict, AttemptState>;

pub(crate) struct Attempt<'a> {
    session: &'a mut Session,
    config: &'a ResolverConfig,
    plan: AttemptPlan,
    query: &'a [u8],
    scratch: &'a mut [u8],
    answer: &'a mut [u8],
    call: &'a mut CallState,
    discarded: usize,
}

impl<'a> Attempt<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: &'a mut Session,
        config: &'a ResolverConfig,
        plan: AttemptPlan,
        query: &'a [u8],
        scratch: &'a mut [u8],
        answer: &'a mut [u8],
        call: &'a mut CallState,
    ) -> Self {
        Self {
            session,
            config,
            plan,
            query,
            scratch,
            answer,
            call,
            discarded: 0,
        }
    }

    pub fn run(mut self) -> Verdict {
        let mut state = AttemptState::SelectTransport;
        loop {
            state = match self.step(state) {
                ControlFlow::Continue(next) => next,
                ControlFlow::Break(verdict) => return verdict,
            };
        }
    }

    fn step(&mut self, state: AttemptState) -> Transition {
        match state {
            AttemptState::SelectTransport => {
                ControlFlow::Continue(AttemptState::Send(self.select_transport()))
            }
            AttemptState::Send(Transport::Udp) => self.send_udp(),
            AttemptState::Send(Transport::Tcp) => self.send_tcp(),
            AttemptState::Wait { channel, deadline } => self.wait(channel, deadline),
            AttemptState::ReceiveUdp { channel, deadline } => self.receive_udp(channel, deadline),
            AttemptState::ReceiveTcp { channel, reused } => self.receive_tcp(channel, reused),
            AttemptState::Validate { socket, len } => self.validate(socket, len),
            AttemptState::Escalate => {
                self.call.force_tcp = true;
                ControlFlow::Continue(AttemptState::Send(Transport::Tcp))
            }
            AttemptState::ReconnectAfterReset => {
                self.call.reset_retried[self.plan.server_index] = true;
                ControlFlow::Continue(AttemptState::Send(Transport::Tcp))
            }
        }
    }

    fn select_transport(&self) -> Transport {
        if self.config.options.use_vc || self.query.len() > PACKET_SZ || self.call.force_tcp {
            Transport::Tcp
        } else {
            Transport::Udp
        }
    }

    fn send_udp(&mut self) -> Transition {
        let channel = match self.session.checkout_udp(self.plan.server) {
            Ok((channel, _)) => channel,
            Err(e) => return self.fail(Transport::Udp, e),
        };

        if let Err(e) = channel.send(self.query) {
            return self.fail(Transport::Udp, e);
        }
        self.call.sent_any = true;

        attempt_event!(
            self.config.options.debug,
            server = %self.plan.server,
            try_index = self.plan.try_index,
            timeout_ms = duration_millis(self.plan.udp_timeout),
            query_len = self.query.len(),
            "UDP query sent"
        );

        let now = Instant::now();
        let deadline = now
            .checked_add(self.plan.udp_timeout)
            .unwrap_or_else(|| now + MAX_WAIT);
        ControlFlow::Continue(AttemptState::Wait { channel, deadline })
    }

    fn send_tcp(&mut self) -> Transition {
        let (mut channel, reused) = match self.session.checkout_tcp(self.plan.server) {
            Ok(checked_out) => checked_out,
            Err(e) => return self.fail(Transport::Tcp, e),
        };

        if let Err(e) = channel.send(self.query) {
            return self.stream_failure(e, reused);
        }
        self.call.sent_any = true;

        attempt_event!(
            self.config.options.debug,
            server = %self.plan.server,
            try_index = self.plan.try_index,
            query_len = self.query.len(),
            reused,
            "TCP query sent"
        );

        ControlFlow::Continue(AttemptState::ReceiveTcp { channel, reused })
    }

    fn wait(&mut self, channel: UdpChannel, deadline: Instant) -> Transition {
        match channel.wait_readable(deadline, self.scratch) {
            Ok(true) => ControlFlow::Continue(AttemptState::ReceiveUdp { channel, deadline }),
            Ok(false) => {
                attempt_event!(
                    self.config.options.debug,
                    server = %self.plan.server,
                    try_index = self.plan.try_index,
                    "UDP wait timed out"
                );
                self.session.restore_udp(channel);
                self.finish(Transport::Udp, AttemptOutcome::TimedOut)
            }
            Err(e) => self.fail(Transport::Udp, e),
        }
    }

    fn receive_udp(&mut self, channel: UdpChannel, deadline: Instant) -> Transition {
        match channel.recv(self.scratch) {
            Ok(len) if len > 0 => ControlFlow::Continue(AttemptState::Validate {
                socket: Held::Udp { channel, deadline },
                len,
            }),
            Ok(_) => self.fail(
                Transport::Udp,
                DomainError::ShortRead {
                    server: self.plan.server,
                    read: 0,
                    expected: dns_header::HEADER_LEN,
                },
            ),
            Err(e) => self.fail(Transport::Udp, e),
        }
    }

    fn receive_tcp(&mut self, mut channel: TcpChannel, reused: bool) -> Transition {
        let declared = match channel.read_length() {
            Ok(declared) => declared,
            Err(e) => return self.stream_failure(e, reused),
        };

        let capacity = self.answer.len();
        match channel.read_body(declared, &mut self.scratch[..capacity]) {
            Ok(reply) => {
                if reply.truncated() {
                    attempt_event!(
                        self.config.options.debug,
                        server = %self.plan.server,
                        declared = reply.declared,
                        kept = reply.copied,
                        "TCP reply larger than answer buffer, remainder drained"
                    );
                }
                ControlFlow::Continue(AttemptState::Validate {
                    socket: Held::Tcp(channel),
                    len: reply.copied,
                })
            }
            Err(e) => self.fail(Transport::Tcp, e),
        }
    }

    fn validate(&mut self, socket: Held, len: usize) -> Transition {
        let transport = socket.transport();

        if !dns_header::ids_match(self.query, &self.scratch[..len]) {
            self.discarded += 1;
            attempt_event!(
                self.config.options.debug,
                server = %self.plan.server,
                transport = %transport,
                query_id = dns_header::transaction_id(self.query),
                reply_id = dns_header::transaction_id(&self.scratch[..len]),
                "Discarding reply with mismatched ID"
            );
            return match socket {
                Held::Udp { channel, deadline } => {
                    ControlFlow::Continue(AttemptState::Wait { channel, deadline })
                }
                Held::Tcp(channel) => {
                    self.call.last_error = Some(DomainError::MismatchedReply {
                        server: self.plan.server,
                    });
                    self.session.restore_tcp(channel);
                    self.finish(Transport::Tcp, AttemptOutcome::Mismatched)
                }
            };
        }

        let capacity = self.answer.len();
        let copied = len.min(capacity);
        if len > capacity {
            dns_header::set_truncated(&mut self.scratch[..copied]);
        }

        if transport == Transport::Udp
            && !self.config.options.ignore_tc
            && dns_header::is_truncated(&self.scratch[..copied])
        {
            attempt_event!(
                self.config.options.debug,
                server = %self.plan.server,
                "Response truncated (TC bit), retrying via TCP"
            );
            // The UDP socket goes with `socket`.
            drop(socket);
            self.call.last_error = Some(DomainError::Truncated {
                server: self.plan.server,
            });
            self.record(Transport::Udp, AttemptOutcome::Truncated);
            return ControlFlow::Continue(AttemptState::Escalate);
        }

        self.answer[..copied].copy_from_slice(&self.scratch[..copied]);
        match socket {
            Held::Udp { channel, .. } => self.session.restore_udp(channel),
            Held::Tcp(channel) => self.session.restore_tcp(channel),
        }

        attempt_event!(
            self.config.options.debug,
            server = %self.plan.server,
            transport = %transport,
            len = copied,
            "Reply accepted"
        );
        self.record(transport, AttemptOutcome::Answered { len: copied });
        ControlFlow::Break(Verdict::Answered {
            len: copied,
            transport,
        })
    }

    /// Failure on a virtual circuit. A reset earns one reconnect to the same
    /// server per call; so does EOF before any reply byte on a reused
    /// circuit, which is how a server that timed out an idle connection
    /// looks from here.
    fn stream_failure(&mut self, err: DomainError, reused: bool) -> Transition {
        let stale_circuit = reused && matches!(err, DomainError::ShortRead { read: 0, .. });
        let resettable = err.is_connection_reset() || stale_circuit;

        if resettable && !self.call.reset_retried[self.plan.server_index] {
            attempt_event!(
                self.config.options.debug,
                server = %self.plan.server,
                error = %err,
                "Connection reset, reconnecting to same server"
            );
            self.call.last_error = Some(err.clone());
            self.record(Transport::Tcp, AttemptOutcome::Reset(err));
            return ControlFlow::Continue(AttemptState::ReconnectAfterReset);
        }

        self.fail(Transport::Tcp, err)
    }

    fn fail(&mut self, transport: Transport, err: DomainError) -> Transition {
        attempt_event!(
            self.config.options.debug,
            server = %self.plan.server,
            transport = %transport,
            try_index = self.plan.try_index,
            error = %err,
            "Attempt failed"
        );
        self.call.last_error = Some(err.clone());
        self.finish(transport, AttemptOutcome::Failed(err))
    }

    fn finish(&mut self, transport: Transport, outcome: AttemptOutcome) -> Transition {
        self.record(transport, outcome);
        ControlFlow::Break(Verdict::NextServer)
    }

    fn record(&mut self, transport: Transport, outcome: AttemptOutcome) {
        let timeout = match transport {
            Transport::Udp => Some(self.plan.udp_timeout),
            Transport::Tcp => None,
        };
        self.session.record(AttemptRecord {
            try_index: self.plan.try_index,
            server_index: self.plan.server_index,
            server: self.plan.server,
            transport,
            timeout,
            discarded: std::mem::take(&mut self.discarded),
            outcome,
        });
    }
}
