//! resolv-send domain layer
pub mod config;
pub mod dns_header;
pub mod dns_protocol;
pub mod errors;

pub use config::{CliOverrides, Config, ConfigError, LoggingConfig, ResolverConfig, ResolverOptions};
pub use dns_protocol::{parse_server_addr, Transport};
pub use errors::{DomainError, IoStep};
