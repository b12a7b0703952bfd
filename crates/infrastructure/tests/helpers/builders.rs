#![allow(dead_code)]
use resolv_send_domain::{ResolverConfig, ResolverOptions};
use std::net::SocketAddr;
use std::time::Duration;

pub const HEADER_LEN: usize = 12;

pub struct QueryBuilder;

impl QueryBuilder {
    /// A query of exactly `len` bytes: header with RD and QDCOUNT=1, then
    /// filler standing in for the question section.
    pub fn sized(id: u16, len: usize) -> Vec<u8> {
        assert!(len >= HEADER_LEN);
        let mut query = vec![0u8; len];
        query[..2].copy_from_slice(&id.to_be_bytes());
        query[2] = 0x01;
        query[5] = 0x01;
        for (i, b) in query.iter_mut().enumerate().skip(HEADER_LEN) {
            *b = (i % 251) as u8;
        }
        query
    }

    pub fn small(id: u16) -> Vec<u8> {
        Self::sized(id, 40)
    }
}

pub struct ReplyBuilder;

impl ReplyBuilder {
    /// Reply echoing the query's ID, QR and RA set, `len` bytes long.
    pub fn for_query(query: &[u8], len: usize) -> Vec<u8> {
        Self::with_id(u16::from_be_bytes([query[0], query[1]]), len)
    }

    pub fn with_id(id: u16, len: usize) -> Vec<u8> {
        assert!(len >= HEADER_LEN);
        let mut reply = vec![0u8; len];
        reply[..2].copy_from_slice(&id.to_be_bytes());
        reply[2] = 0x81;
        reply[3] = 0x80;
        reply[5] = 0x01;
        reply[7] = 0x01;
        for (i, b) in reply.iter_mut().enumerate().skip(HEADER_LEN) {
            *b = (i % 199) as u8;
        }
        reply
    }

    pub fn truncated_for(query: &[u8], len: usize) -> Vec<u8> {
        let mut reply = Self::for_query(query, len);
        reply[2] |= 0x02;
        reply
    }

    pub fn mismatched_for(query: &[u8], len: usize) -> Vec<u8> {
        let id = u16::from_be_bytes([query[0], query[1]]);
        Self::with_id(id.wrapping_add(1), len)
    }
}

pub struct ConfigBuilder {
    config: ResolverConfig,
}

impl ConfigBuilder {
    pub fn new(servers: &[SocketAddr]) -> Self {
        Self {
            config: ResolverConfig::new(servers.to_vec())
                .with_retry(0)
                .with_timeout(Duration::from_millis(100)),
        }
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn use_vc(mut self) -> Self {
        self.config.options.use_vc = true;
        self
    }

    pub fn ignore_tc(mut self) -> Self {
        self.config.options.ignore_tc = true;
        self
    }

    pub fn stay_open(mut self) -> Self {
        self.config.options.stay_open = true;
        self
    }

    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}

pub fn is_truncated(message: &[u8]) -> bool {
    message[2] & 0x02 != 0
}

pub fn id_of(message: &[u8]) -> u16 {
    u16::from_be_bytes([message[0], message[1]])
}
