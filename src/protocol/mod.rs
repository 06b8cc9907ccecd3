//! # Wire Protocol Module
//!
//! Decoding and normalization of the instrument's inbound frames, and
//! encoding of outbound command frames.
//!
//! This module handles:
//! - Numeric sanitation of `+`/zero-padded values
//! - Three-strategy frame decoding (JSON, repaired JSON, delimited line)
//! - Alias normalization onto the canonical field set
//! - Severity classification constants
//! - Outbound `{"type":"command", ...}` frame encoding

pub mod decoder;
pub mod encoder;
pub mod fields;
pub mod normalize;
pub mod sanitize;
