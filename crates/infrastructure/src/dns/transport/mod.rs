pub mod framing;
pub mod tcp;
pub mod udp;

use resolv_send_domain::Transport;
use std::net::SocketAddr;

pub use framing::FramedReply;
pub use tcp::TcpChannel;
pub use udp::UdpChannel;

/// The one live socket a session may hold.
#[derive(Debug)]
pub enum SessionSocket {
    Udp(UdpChannel),
    Tcp(TcpChannel),
}

impl SessionSocket {
    pub fn transport(&self) -> Transport {
        match self {
            Self::Udp(_) => Transport::Udp,
            Self::Tcp(_) => Transport::Tcp,
        }
    }

    pub fn server(&self) -> SocketAddr {
        match self {
            Self::Udp(c) => c.server(),
            Self::Tcp(c) => c.server(),
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        self.transport().protocol_name()
    }
}
