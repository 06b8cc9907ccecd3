//! # Canonical Field Definitions
//!
//! Core field names and record types for the instrument wire protocol.

use serde_json::{Map, Value};

/// A decoded telemetry record: canonical field name to JSON value.
///
/// Absent or unparseable numeric fields are represented as `Value::Null`,
/// never `NaN`, so chart consumers can treat them as "no data".
pub type TelemetryRecord = Map<String, Value>;

/// Discriminator field carried by structured frames
pub const TYPE_FIELD: &str = "type";

/// Canonical column order for delimited (CSV/TSV) records.
///
/// The instrument emits one line per sample with exactly this layout;
/// trailing columns may be missing and extra cells are ignored.
pub const CSV_FIELDS: &[&str] = &[
    "DateTime",
    "PacketIdx",
    "AccelX",
    "AccelY",
    "AccelZ",
    "AccelSum",
    "Pitch",
    "Roll",
    "Yaw",
    "Speed",
    "Latitude",
    "Longitude",
    "EventClass",
    "EventClassText",
];

/// Delimiters accepted for delimited lines, in probe order.
/// The first delimiter found in the line wins; comma is the fallback.
pub const DELIMITERS: &[char] = &[';', '\t', ','];

/// Severity threshold between "verde" and "giallo" (acceleration magnitude, g)
pub const SEVERITY_YELLOW_THRESHOLD: f64 = 1.25;

/// Severity threshold between "giallo" and "rosso" (acceleration magnitude, g)
pub const SEVERITY_RED_THRESHOLD: f64 = 1.6;

/// Three-level severity classification derived from acceleration magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Verde,
    Giallo,
    Rosso,
}

impl Severity {
    /// Wire label for this severity (`EventClassText` column)
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Verde => "verde",
            Severity::Giallo => "giallo",
            Severity::Rosso => "rosso",
        }
    }

    /// Numeric code for this severity (`EventClass` column)
    pub fn code(&self) -> u8 {
        match self {
            Severity::Verde => 0,
            Severity::Giallo => 1,
            Severity::Rosso => 2,
        }
    }
}

/// Classify an acceleration magnitude into a severity level
///
/// Thresholds: `< 1.25` is verde, `[1.25, 1.6)` is giallo, `>= 1.6` is rosso.
pub fn classify_magnitude(magnitude: f64) -> Severity {
    if magnitude >= SEVERITY_RED_THRESHOLD {
        Severity::Rosso
    } else if magnitude >= SEVERITY_YELLOW_THRESHOLD {
        Severity::Giallo
    } else {
        Severity::Verde
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_layout() {
        assert_eq!(CSV_FIELDS.len(), 14, "Instrument schema has 14 columns");
        assert_eq!(CSV_FIELDS[0], "DateTime");
        assert_eq!(CSV_FIELDS[9], "Speed");
        assert_eq!(CSV_FIELDS[13], "EventClassText");
    }

    #[test]
    fn test_delimiter_probe_order() {
        // Semicolon is probed before tab, tab before comma
        assert_eq!(DELIMITERS, &[';', '\t', ',']);
    }

    #[test]
    fn test_classify_magnitude_bands() {
        assert_eq!(classify_magnitude(0.5), Severity::Verde);
        assert_eq!(classify_magnitude(1.3), Severity::Giallo);
        assert_eq!(classify_magnitude(1.7), Severity::Rosso);
    }

    #[test]
    fn test_classify_magnitude_boundaries() {
        assert_eq!(classify_magnitude(1.25), Severity::Giallo);
        assert_eq!(classify_magnitude(1.6), Severity::Rosso);
        assert_eq!(classify_magnitude(0.0), Severity::Verde);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Verde.as_str(), "verde");
        assert_eq!(Severity::Giallo.as_str(), "giallo");
        assert_eq!(Severity::Rosso.as_str(), "rosso");
        assert_eq!(Severity::Verde.code(), 0);
        assert_eq!(Severity::Giallo.code(), 1);
        assert_eq!(Severity::Rosso.code(), 2);
    }
}
