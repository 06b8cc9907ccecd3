//! # Field Normalizer
//!
//! The instrument firmware has changed naming conventions over time:
//! structured frames may carry `timestamp` instead of `DateTime`, `Lat`
//! instead of `Latitude`, lower-camel acceleration/attitude keys, and the
//! legacy `classificazione` label. This pass maps those aliases onto the
//! canonical field set without discarding the original keys and without
//! overwriting fields already present in canonical form.
//!
//! Normalization is a pure function, applied only to structured decode
//! results; delimited records are keyed canonically by construction.

use serde_json::{Number, Value};

use super::fields::TelemetryRecord;
use super::sanitize::sanitize_number;

/// Lower-camel instrument aliases and their canonical-case equivalents.
/// Values are numeric-coerced on the way over.
const NUMERIC_ALIASES: &[(&str, &str)] = &[
    ("accelX", "AccelX"),
    ("accelY", "AccelY"),
    ("accelZ", "AccelZ"),
    ("accelSum", "AccelSum"),
    ("pitch", "Pitch"),
    ("roll", "Roll"),
    ("yaw", "Yaw"),
    ("Speed", "Speed"),
];

/// Map alternate key spellings onto the canonical field set.
///
/// Each rule applies only when the canonical target key is absent, so an
/// instrument that already speaks canonically passes through untouched.
/// All original keys are preserved alongside the added canonical ones.
pub fn normalize_record(record: TelemetryRecord) -> TelemetryRecord {
    let mut out = record;

    // timestamp -> DateTime (copied as-is)
    if !out.contains_key("DateTime") {
        if let Some(ts) = out.get("timestamp") {
            if is_present(ts) {
                let ts = ts.clone();
                out.insert("DateTime".to_string(), ts);
            }
        }
    }

    // Lat/Lon -> Latitude/Longitude with sign and zero-padding cleanup
    if !out.contains_key("Latitude") {
        if let Some(lat) = out.get("Lat") {
            let lat = coerce_number(lat);
            out.insert("Latitude".to_string(), lat);
        }
    }
    if !out.contains_key("Longitude") {
        if let Some(lon) = out.get("Lon") {
            let lon = coerce_number(lon);
            out.insert("Longitude".to_string(), lon);
        }
    }

    // classificazione -> EventClassText
    if !out.contains_key("EventClassText") {
        if let Some(class) = out.get("classificazione") {
            if is_present(class) {
                let class = class.clone();
                out.insert("EventClassText".to_string(), class);
            }
        }
    }

    for (alias, canonical) in NUMERIC_ALIASES {
        if !out.contains_key(*canonical) {
            if let Some(value) = out.get(*alias) {
                let value = coerce_number(value);
                out.insert((*canonical).to_string(), value);
            }
        }
    }

    out
}

/// Numeric coercion for alias values: numbers pass through, numeric text
/// is sanitized, everything else becomes null (never `NaN`).
fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => match sanitize_number(s) {
            Some(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

/// A value worth aliasing: present, non-null, and not an empty string
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> TelemetryRecord {
        match v {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_normalize_timestamp_alias() {
        let out = normalize_record(record(json!({"timestamp": "2025-01-01T00:00:00Z"})));
        assert_eq!(out["DateTime"], json!("2025-01-01T00:00:00Z"));
        // Original key preserved
        assert_eq!(out["timestamp"], json!("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_normalize_lat_lon_sanitized() {
        let out = normalize_record(record(json!({"Lat": "+043.21", "Lon": "013.50"})));
        assert_eq!(out["Latitude"], json!(43.21));
        assert_eq!(out["Longitude"], json!(13.5));
        assert_eq!(out["Lat"], json!("+043.21"));
        assert_eq!(out["Lon"], json!("013.50"));
    }

    #[test]
    fn test_normalize_never_overwrites_canonical() {
        let out = normalize_record(record(json!({
            "Lat": "1.0",
            "Latitude": 43.6,
            "timestamp": "t1",
            "DateTime": "t0",
        })));
        assert_eq!(out["Latitude"], json!(43.6));
        assert_eq!(out["DateTime"], json!("t0"));
    }

    #[test]
    fn test_normalize_classification_alias() {
        let out = normalize_record(record(json!({"classificazione": "rosso"})));
        assert_eq!(out["EventClassText"], json!("rosso"));
        assert_eq!(out["classificazione"], json!("rosso"));
    }

    #[test]
    fn test_normalize_lower_camel_accelerations() {
        let out = normalize_record(record(json!({
            "accelX": "0.1",
            "accelY": 0.2,
            "accelZ": "9.8",
            "accelSum": "9.81",
        })));
        assert_eq!(out["AccelX"], json!(0.1));
        assert_eq!(out["AccelY"], json!(0.2));
        assert_eq!(out["AccelZ"], json!(9.8));
        assert_eq!(out["AccelSum"], json!(9.81));
    }

    #[test]
    fn test_normalize_attitude_aliases() {
        let out = normalize_record(record(json!({"pitch": "1.5", "roll": -2.0, "yaw": "180"})));
        assert_eq!(out["Pitch"], json!(1.5));
        assert_eq!(out["Roll"], json!(-2.0));
        assert_eq!(out["Yaw"], json!(180.0));
    }

    #[test]
    fn test_normalize_unparseable_numeric_becomes_null() {
        // Consumers must see null for missing data, never NaN
        let out = normalize_record(record(json!({"accelX": "n/a", "Lat": "dunno"})));
        assert_eq!(out["AccelX"], Value::Null);
        assert_eq!(out["Latitude"], Value::Null);
    }

    #[test]
    fn test_normalize_null_alias_becomes_null() {
        let out = normalize_record(record(json!({"accelX": null})));
        assert_eq!(out["AccelX"], Value::Null);
    }

    #[test]
    fn test_normalize_empty_timestamp_ignored() {
        let out = normalize_record(record(json!({"timestamp": ""})));
        assert!(!out.contains_key("DateTime"));
    }

    #[test]
    fn test_normalize_is_pure_passthrough_for_canonical() {
        let canonical = record(json!({"DateTime": "t", "Speed": 12.5, "Latitude": 43.6}));
        let out = normalize_record(canonical.clone());
        assert_eq!(out, canonical);
    }
}
