//! Blocking send layer of a DNS stub resolver.
//!
//! A [`Session`] delivers an encoded query to a list of name servers and
//! returns the first reply carrying the query's transaction ID, falling back
//! from UDP to TCP on truncation and retrying across servers.
pub mod dns;

pub use dns::{send_query, AttemptOutcome, AttemptRecord, Session};
