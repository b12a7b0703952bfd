//! DNS-over-TCP framing (RFC 1035 §4.2.2)
//!
//! Every message on a stream is preceded by its length as a 2-byte
//! big-endian integer. UDP datagrams carry no framing.

use resolv_send_domain::dns_header::{self, MAX_TCP_MESSAGE_SIZE};
use resolv_send_domain::{DomainError, IoStep};
use std::io::{self, Read, Write};
use std::net::SocketAddr;

pub const LENGTH_PREFIX_LEN: usize = 2;

/// Size of the scratch chunks used to discard oversized replies.
const DRAIN_CHUNK_SIZE: usize = 512;

/// Result of reading one framed reply into a bounded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedReply {
    /// Bytes copied into the caller's buffer.
    pub copied: usize,
    /// Length announced by the prefix.
    pub declared: usize,
}

impl FramedReply {
    pub fn truncated(&self) -> bool {
        self.declared > self.copied
    }
}

/// Builds prefix and message as one contiguous frame so it goes out in a
/// single write.
pub fn encode_frame(message: &[u8]) -> Result<Vec<u8>, DomainError> {
    let length = u16::try_from(message.len()).map_err(|_| {
        DomainError::InvalidQuery(format!(
            "Message too large for TCP framing: {} bytes (max {})",
            message.len(),
            MAX_TCP_MESSAGE_SIZE
        ))
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + message.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(message);
    Ok(frame)
}

pub fn write_frame<W>(stream: &mut W, message: &[u8], server: SocketAddr) -> Result<usize, DomainError>
where
    W: Write,
{
    let frame = encode_frame(message)?;

    let written = stream
        .write(&frame)
        .map_err(|e| DomainError::from_io(IoStep::Write, server, &e))?;

    if written != frame.len() {
        return Err(DomainError::ShortWrite {
            server,
            written,
            expected: frame.len(),
        });
    }

    Ok(written)
}

pub fn read_length_prefix<R>(stream: &mut R, server: SocketAddr) -> Result<usize, DomainError>
where
    R: Read,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    read_full(stream, &mut len_buf, server)?;
    Ok(u16::from_be_bytes(len_buf) as usize)
}

/// Reads a message body of `declared` bytes. At most `buf.len()` bytes are
/// kept; the rest is drained so the stream stays framed for reuse, and the
/// kept copy gets its TC bit set.
pub fn read_body<R>(
    stream: &mut R,
    declared: usize,
    buf: &mut [u8],
    server: SocketAddr,
) -> Result<FramedReply, DomainError>
where
    R: Read,
{
    let copied = declared.min(buf.len());
    read_full(stream, &mut buf[..copied], server)?;

    let reply = FramedReply { copied, declared };
    if reply.truncated() {
        drain(stream, declared - copied, server)?;
        dns_header::set_truncated(&mut buf[..copied]);
    }

    Ok(reply)
}

pub fn read_frame<R>(stream: &mut R, buf: &mut [u8], server: SocketAddr) -> Result<FramedReply, DomainError>
where
    R: Read,
{
    let declared = read_length_prefix(stream, server)?;
    read_body(stream, declared, buf, server)
}

fn drain<R>(stream: &mut R, mut remaining: usize, server: SocketAddr) -> Result<(), DomainError>
where
    R: Read,
{
    let mut junk = [0u8; DRAIN_CHUNK_SIZE];
    while remaining > 0 {
        let chunk = remaining.min(DRAIN_CHUNK_SIZE);
        read_full(stream, &mut junk[..chunk], server)?;
        remaining -= chunk;
    }
    Ok(())
}

fn read_full<R>(stream: &mut R, buf: &mut [u8], server: SocketAddr) -> Result<(), DomainError>
where
    R: Read,
{
    let mut read = 0;
    while read < buf.len() {
        match stream.read(&mut buf[read..]) {
            Ok(0) => {
                return Err(DomainError::ShortRead {
                    server,
                    read,
                    expected: buf.len(),
                })
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DomainError::from_io(IoStep::Read, server, &e)),
        }
    }
    Ok(())
}
