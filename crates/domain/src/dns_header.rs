//! DNS message header accessors (RFC 1035 §4.1.1)
//!
//! Only the fields the send layer needs are exposed: the transaction ID at
//! offset 0 and the TC flag in the high flags byte. Everything else in the
//! message is opaque here.

/// Fixed size of the DNS header.
pub const HEADER_LEN: usize = 12;

/// Largest message that may be sent over UDP without EDNS(0).
pub const PACKET_SZ: usize = 512;

/// Largest message a 2-byte TCP length prefix can describe.
pub const MAX_TCP_MESSAGE_SIZE: usize = u16::MAX as usize;

const FLAGS_HI: usize = 2;
const TC_MASK: u8 = 0x02;

pub fn transaction_id(message: &[u8]) -> Option<u16> {
    match message {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

pub fn is_truncated(message: &[u8]) -> bool {
    message
        .get(FLAGS_HI)
        .map(|flags| flags & TC_MASK != 0)
        .unwrap_or(false)
}

/// Sets the TC bit. Messages too short to carry the flags byte are left alone.
pub fn set_truncated(message: &mut [u8]) {
    if let Some(flags) = message.get_mut(FLAGS_HI) {
        *flags |= TC_MASK;
    }
}

/// True when `response` carries the same transaction ID as `query` and is
/// long enough to be a DNS message at all.
pub fn ids_match(query: &[u8], response: &[u8]) -> bool {
    if response.len() < HEADER_LEN {
        return false;
    }
    match (transaction_id(query), transaction_id(response)) {
        (Some(q), Some(r)) => q == r,
        _ => false,
    }
}
