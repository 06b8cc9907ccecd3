//! # Error Types
//!
//! Custom error types for Telemetry Bridge using `thiserror`.
//!
//! Link-level failures (decode, transport, subscriber faults) are
//! contained within the session and surface only as emitted events; this
//! enum covers the failures that do cross an API boundary.

use thiserror::Error;

/// Main error type for Telemetry Bridge
#[derive(Debug, Error)]
pub enum TelemetryBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Telemetry Bridge
pub type Result<T> = std::result::Result<T, TelemetryBridgeError>;
