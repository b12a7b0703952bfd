use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::dns_protocol::parse_server_addr;

/// Behaviour switches for the send layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverOptions {
    /// Always use a virtual circuit (TCP).
    #[serde(default)]
    pub use_vc: bool,

    /// Accept truncated UDP answers instead of retrying over TCP.
    #[serde(default)]
    pub ignore_tc: bool,

    /// Keep the session socket open between calls.
    #[serde(default)]
    pub stay_open: bool,

    /// Emit per-attempt diagnostics at debug level.
    #[serde(default)]
    pub debug: bool,
}

/// Read-only input to every send call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Name servers in the order they are tried.
    #[serde(default, deserialize_with = "deserialize_servers")]
    pub servers: Vec<SocketAddr>,

    /// Extra passes over the server list after the first one.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Base per-attempt UDP timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub options: ResolverOptions,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            retry: default_retry(),
            timeout_ms: default_timeout_ms(),
            options: ResolverOptions::default(),
        }
    }
}

impl ResolverConfig {
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn deserialize_servers<'de, D>(deserializer: D) -> Result<Vec<SocketAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(deserializer)?;
    raw.iter()
        .map(|s| parse_server_addr(s).map_err(serde::de::Error::custom))
        .collect()
}

fn default_retry() -> u32 {
    2
}

fn default_timeout_ms() -> u64 {
    5000
}
