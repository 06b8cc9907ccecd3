//! # Telemetry Bridge Library
//!
//! Resilient ingest of a single-instrument telemetry stream over
//! WebSocket, republished as typed events for presentation consumers.
//!
//! This library provides the transport and message-normalization core:
//! connection lifecycle with reconnect/backoff, multi-format frame
//! decoding, field normalization, and a synthetic session that satisfies
//! the identical event contract for development without hardware.

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
