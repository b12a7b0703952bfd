//! Retry scheduler
//!
//! Walks the try × server matrix in strict order: every server is tried once
//! per pass, and there are `retry + 1` passes. Individual attempt failures
//! never abort the call; only an exhausted matrix produces an error.

use super::attempt::{Attempt, AttemptPlan, CallState, Verdict};
use super::session::Session;
use resolv_send_domain::dns_header::{HEADER_LEN, MAX_TCP_MESSAGE_SIZE, PACKET_SZ};
use resolv_send_domain::{DomainError, ResolverConfig};
use std::time::Duration;
use tracing::debug;

/// Smallest per-attempt wait the scheduler hands out.
pub const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1);

/// Per-attempt UDP wait for pass `try_index`.
///
/// The base timeout doubles on every pass; from the second pass on it is
/// spread over the server list so a full pass takes about as long as a
/// single wait would.
pub fn udp_attempt_timeout(base: Duration, try_index: u32, server_count: usize) -> Duration {
    let base_ms = duration_millis(base);
    let mut ms = 1u64
        .checked_shl(try_index)
        .map_or(u64::MAX, |factor| base_ms.saturating_mul(factor));

    if try_index > 0 {
        ms /= server_count.max(1) as u64;
    }

    Duration::from_millis(ms).max(MIN_ATTEMPT_TIMEOUT)
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Delivers `query` to the configured servers and copies the first valid
/// reply into `answer`.
///
/// Returns the number of bytes written into `answer`. On exhaustion the error
/// is [`DomainError::NoServerReachable`] when nothing could be sent,
/// [`DomainError::Timeout`] otherwise, or the last transport error when
/// every exchange of the call had to go over TCP.
pub fn send_query(
    session: &mut Session,
    config: &ResolverConfig,
    query: &[u8],
    answer: &mut [u8],
) -> Result<usize, DomainError> {
    check_arguments(config, query, answer)?;
    session.begin_call();

    let server_count = config.servers.len();
    let vc_throughout = config.options.use_vc || query.len() > PACKET_SZ;
    let mut call = CallState::new(server_count);
    // One spare byte lets an oversized datagram be told apart from an exact fit.
    let mut scratch = vec![0u8; answer.len() + 1];

    for try_index in 0..=config.retry {
        let udp_timeout = udp_attempt_timeout(config.base_timeout(), try_index, server_count);

        for (server_index, &server) in config.servers.iter().enumerate() {
            let plan = AttemptPlan {
                try_index,
                server_index,
                server,
                udp_timeout,
            };

            let verdict = Attempt::new(
                session,
                config,
                plan,
                query,
                &mut scratch,
                answer,
                &mut call,
            )
            .run();

            if let Verdict::Answered { len, transport } = verdict {
                session.release_if_appropriate(transport, server_index, &config.options);
                return Ok(len);
            }
        }
    }

    // A failed call keeps no socket unless the caller asked for it.
    if !config.options.stay_open {
        session.close();
    }

    let err = call.into_error(vc_throughout);
    debug!(
        servers = server_count,
        tries = u64::from(config.retry) + 1,
        error = %err,
        "All name servers exhausted"
    );
    Err(err)
}

fn check_arguments(
    config: &ResolverConfig,
    query: &[u8],
    answer: &[u8],
) -> Result<(), DomainError> {
    if config.servers.is_empty() {
        return Err(DomainError::NoServersConfigured);
    }
    if query.len() < HEADER_LEN {
        return Err(DomainError::InvalidQuery(format!(
            "Query of {} bytes is shorter than a DNS header",
            query.len()
        )));
    }
    if query.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(DomainError::InvalidQuery(format!(
            "Query of {} bytes exceeds the maximum DNS message size",
            query.len()
        )));
    }
    if answer.len() < HEADER_LEN {
        return Err(DomainError::InvalidQuery(format!(
            "Answer buffer of {} bytes cannot hold a DNS header",
            answer.len()
        )));
    }
    Ok(())
}
