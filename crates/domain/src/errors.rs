use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid DNS query: {0}")]
    InvalidQuery(String),

    #[error("No name servers configured")]
    NoServersConfigured,

    #[error("Failed to create {transport} socket for {server}: {reason}")]
    SocketCreateFailed {
        transport: &'static str,
        server: SocketAddr,
        reason: String,
    },

    #[error("Failed to connect to {server}: {reason}")]
    ConnectFailed { server: SocketAddr, reason: String },

    #[error("Failed to write query to {server}: {reason}")]
    WriteFailed { server: SocketAddr, reason: String },

    #[error("Short write to {server}: {written} of {expected} bytes")]
    ShortWrite {
        server: SocketAddr,
        written: usize,
        expected: usize,
    },

    #[error("Failed to read response from {server}: {reason}")]
    ReadFailed { server: SocketAddr, reason: String },

    #[error("Short read from {server}: connection closed after {read} of {expected} bytes")]
    ShortRead {
        server: SocketAddr,
        read: usize,
        expected: usize,
    },

    #[error("Transport connection reset by {server}")]
    ConnectionReset { server: SocketAddr },

    #[error("Reply from {server} does not match the query ID")]
    MismatchedReply { server: SocketAddr },

    #[error("Response from {server} is truncated")]
    Truncated { server: SocketAddr },

    #[error("Query timeout")]
    Timeout,

    #[error("No name server could be reached")]
    NoServerReachable,
}

/// Which step of an exchange an I/O error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStep {
    Connect,
    Write,
    Read,
}

impl DomainError {
    /// Maps an I/O error into the taxonomy. Resets, aborts and broken pipes
    /// all mean the peer tore the connection down.
    pub fn from_io(step: IoStep, server: SocketAddr, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
                if step != IoStep::Connect =>
            {
                Self::ConnectionReset { server }
            }
            _ => match step {
                IoStep::Connect => Self::ConnectFailed {
                    server,
                    reason: err.to_string(),
                },
                IoStep::Write => Self::WriteFailed {
                    server,
                    reason: err.to_string(),
                },
                IoStep::Read => Self::ReadFailed {
                    server,
                    reason: err.to_string(),
                },
            },
        }
    }

    pub fn is_connection_reset(&self) -> bool {
        matches!(self, Self::ConnectionReset { .. })
    }
}
