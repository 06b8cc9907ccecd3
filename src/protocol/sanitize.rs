//! # Numeric Sanitizer
//!
//! The instrument emits numeric text with inconsistent formatting: a
//! leading `+` on positive values and redundant leading zeros
//! (`"+043.21"`, `"013.50"`). This module coerces such text into plain
//! numbers, and applies the equivalent cleanup to whole JSON frames so
//! that an otherwise-valid frame with bare `+`/`0`-prefixed literals can
//! still be parsed.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// `: +4` -> `: 4` (plus sign after a key separator)
static RE_PLUS_AFTER_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*\+(\d)").expect("valid regex"));

/// `: 0123` -> `: 123` (redundant leading zeros after a key separator;
/// a lone `0.x` fraction is left alone because `0+` must be followed by
/// another digit)
static RE_ZEROS_AFTER_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*0+(\d)").expect("valid regex"));

/// `^0+(\d)` -> `$1` for single values (`"0123"` -> `"123"`)
static RE_LEADING_ZEROS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0+(\d)").expect("valid regex"));

/// Coerce loosely-formatted numeric text into a number.
///
/// Strips a single leading `+`, strips redundant leading zeros when the
/// text matches "one or more zeros followed by a digit" (`"0123"` becomes
/// `"123"`, `"0.5"` is untouched), then parses as decimal. Returns `None`
/// when the result is not a finite number, so downstream consumers never
/// see `NaN`.
///
/// # Examples
///
/// ```
/// use telemetry_bridge::protocol::sanitize::sanitize_number;
///
/// assert_eq!(sanitize_number("+043.21"), Some(43.21));
/// assert_eq!(sanitize_number("013.50"), Some(13.5));
/// assert_eq!(sanitize_number("0.5"), Some(0.5));
/// assert_eq!(sanitize_number("n/a"), None);
/// ```
pub fn sanitize_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let cleaned = if has_redundant_leading_zero(unsigned) {
        RE_LEADING_ZEROS.replace(unsigned, "$1")
    } else {
        Cow::Borrowed(unsigned)
    };

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// True when the text starts with a zero immediately followed by another
/// digit (`"013"`, `"007.5"`), i.e. the zero is padding rather than a
/// `0.x` fraction.
fn has_redundant_leading_zero(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes.next() == Some(b'0') && bytes.next().is_some_and(|b| b.is_ascii_digit())
}

/// Textual repair pass for almost-JSON frames.
///
/// Rewrites `: +<digit>` to `: <digit>` and `: 0…0<digit>` (leading
/// zeros before a digit, not before a lone fraction like `0.5`) to
/// `: <digit>`, producing text that a strict JSON parser will accept.
/// Returns the input unchanged (borrowed) when no rewrite applies, so
/// callers can cheaply detect whether a retry is worthwhile.
pub fn repair_json_text(raw: &str) -> Cow<'_, str> {
    let pass1 = RE_PLUS_AFTER_COLON.replace_all(raw, ": $1");
    let pass2 = match RE_ZEROS_AFTER_COLON.replace_all(&pass1, ": $1") {
        Cow::Borrowed(_) => None,
        Cow::Owned(s) => Some(s),
    };
    match pass2 {
        Some(s) => Cow::Owned(s),
        None => pass1,
    }
}
