//! Query construction and reply rendering with `hickory-proto`.

use anyhow::Context;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use resolv_send_infrastructure::{AttemptOutcome, AttemptRecord};
use std::fmt::Write;
use std::str::FromStr;

/// Builds a recursive IN-class query with a random ID.
pub fn build_query(name: &str, record_type: RecordType) -> anyhow::Result<Vec<u8>> {
    let name = Name::from_str(name).with_context(|| format!("Invalid domain name '{name}'"))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .context("Failed to serialize DNS query")?;

    Ok(buf)
}

pub fn parse_record_type(value: &str) -> anyhow::Result<RecordType> {
    RecordType::from_str(&value.to_ascii_uppercase())
        .with_context(|| format!("Unknown record type '{value}'"))
}

/// Zone-file style rendering of a reply.
pub fn render_reply(reply: &[u8]) -> anyhow::Result<String> {
    let message = Message::from_vec(reply).context("Failed to parse DNS reply")?;

    let mut out = String::new();
    let _ = writeln!(
        out,
        ";; rcode: {:?}, truncated: {}, answers: {}, authority: {}",
        message.response_code(),
        message.truncated(),
        message.answers().len(),
        message.name_servers().len()
    );

    for (title, records) in [
        ("ANSWER", message.answers()),
        ("AUTHORITY", message.name_servers()),
    ] {
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(out, ";; {title} SECTION:");
        for r in records {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}",
                r.name(),
                r.ttl(),
                r.record_type(),
                r.data()
            );
        }
    }

    Ok(out)
}

pub fn describe_attempt(attempt: &AttemptRecord) -> String {
    let outcome = match &attempt.outcome {
        AttemptOutcome::Answered { len } => format!("answered ({len} bytes)"),
        AttemptOutcome::TimedOut => "timed out".to_string(),
        AttemptOutcome::Mismatched => "mismatched reply".to_string(),
        AttemptOutcome::Truncated => "truncated, retrying over TCP".to_string(),
        AttemptOutcome::Reset(e) => format!("reset ({e}), reconnecting"),
        AttemptOutcome::Failed(e) => format!("failed: {e}"),
    };

    let mut line = format!(
        ";; try {} server {} via {}",
        attempt.try_index, attempt.server, attempt.transport
    );
    if let Some(timeout) = attempt.timeout {
        let _ = write!(line, " wait {}ms", timeout.as_millis());
    }
    if attempt.discarded > 0 {
        let _ = write!(line, " discarded {}", attempt.discarded);
    }
    let _ = write!(line, ": {outcome}");
    line
}
