use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

pub const DEFAULT_DNS_PORT: u16 = 53;

/// Wire transport used for a single exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Udp,
    /// Virtual circuit.
    Tcp,
}

impl Transport {
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Transport::Udp => "UDP",
            Transport::Tcp => "TCP",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol_name())
    }
}

/// Parses a name server entry: `ip:port`, `[v6]:port` or a bare address,
/// which gets the standard DNS port.
pub fn parse_server_addr(s: &str) -> Result<SocketAddr, String> {
    let trimmed = s.trim();
    if let Ok(addr) = SocketAddr::from_str(trimmed) {
        return Ok(addr);
    }
    IpAddr::from_str(trimmed)
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
        .map_err(|e| format!("Invalid name server address '{}': {}", s, e))
}
