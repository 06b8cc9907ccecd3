//! # Frame Decoder
//!
//! Decodes one inbound text frame into a telemetry record.
//!
//! The instrument is inconsistent about its wire format, so decoding
//! tries three strategies in strict order:
//! 1. direct JSON parse
//! 2. JSON parse after the `+`/leading-zero repair pass
//! 3. delimited line (`;`, tab or `,`) zipped against the canonical
//!    column order
//!
//! Malformed frames are expected on a noisy link: a frame that matches
//! none of the strategies is dropped silently and must never destabilize
//! the session.

use std::borrow::Cow;

use serde_json::{Number, Value};

use super::fields::{TelemetryRecord, CSV_FIELDS, DELIMITERS};
use super::sanitize::repair_json_text;

/// A successfully decoded frame, tagged with the strategy that produced it.
///
/// Field normalization applies only to structured payloads; delimited
/// records are already keyed by the canonical column names.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Paths (1) and (2): the frame was a JSON object
    Structured(TelemetryRecord),
    /// Path (3): the frame was one delimited text line
    Delimited(TelemetryRecord),
}

impl Decoded {
    /// The decoded record, regardless of strategy
    pub fn record(&self) -> &TelemetryRecord {
        match self {
            Decoded::Structured(r) | Decoded::Delimited(r) => r,
        }
    }

    /// Consume and return the decoded record
    pub fn into_record(self) -> TelemetryRecord {
        match self {
            Decoded::Structured(r) | Decoded::Delimited(r) => r,
        }
    }
}

/// Decode one raw text frame.
///
/// Returns `None` for empty/whitespace-only frames and for frames that
/// match none of the three strategies. Non-object JSON values (a bare
/// number, string or array) fall through to the delimited path because
/// the event contract requires a key/value record.
pub fn decode_frame(raw: &str) -> Option<Decoded> {
    // 1) Direct JSON parse
    if let Some(record) = try_parse_object(raw) {
        return Some(Decoded::Structured(record));
    }

    // 2) JSON parse after the textual repair pass; only worth retrying
    //    when the repair actually changed the text
    if let Cow::Owned(fixed) = repair_json_text(raw) {
        if let Some(record) = try_parse_object(&fixed) {
            return Some(Decoded::Structured(record));
        }
    }

    // 3) One delimited text record
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }
    Some(Decoded::Delimited(parse_delimited_line(line)))
}

/// Strict JSON parse that only accepts a top-level object
fn try_parse_object(text: &str) -> Option<TelemetryRecord> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parse a delimited line against the canonical column order.
///
/// The delimiter is chosen by probing `;`, tab, `,` in order: the first
/// one present in the line wins, with comma as the fallback. Cells are
/// converted to numbers when they parse as finite decimals, kept as text
/// otherwise. Extra cells beyond the column list are dropped; missing
/// trailing cells leave those fields absent.
fn parse_delimited_line(line: &str) -> TelemetryRecord {
    let delimiter = DELIMITERS
        .iter()
        .copied()
        .find(|d| line.contains(*d))
        .unwrap_or(',');

    let mut record = TelemetryRecord::new();
    for (name, cell) in CSV_FIELDS.iter().zip(line.split(delimiter)) {
        record.insert((*name).to_string(), cell_value(cell));
    }
    record
}

/// Number when the cell parses as a finite decimal, text otherwise.
/// Integer-looking cells stay integers so `PacketIdx` round-trips.
fn cell_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            if let Some(num) = Number::from_f64(n) {
                return Value::Number(num);
            }
        }
    }
    Value::String(cell.to_string())
}
