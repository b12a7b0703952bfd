use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to write config file {path}: {reason}")]
    FileWrite { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("No name servers configured")]
    NoServers,

    #[error("Timeout must be at least 1 ms")]
    ZeroTimeout,

    #[error("Name server {0} is not a usable destination")]
    UnusableServer(SocketAddr),
}
