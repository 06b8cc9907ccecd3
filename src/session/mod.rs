//! # Session Module
//!
//! Telemetry session implementations sharing one event/command contract.
//!
//! This module handles:
//! - The `TelemetrySession` capability set both implementations satisfy
//! - Typed event kinds, payloads and the subscription table
//! - The WebSocket transport session with reconnect/backoff
//! - The synthetic session for development without hardware
//! - Construction from configuration

pub mod backoff;
pub mod events;
pub mod factory;
pub mod mock;
pub mod ws;

use serde_json::Value;

use self::events::{EventCallback, EventKind, SubscriptionId};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Capability set shared by the transport and synthetic sessions.
///
/// All operations are non-blocking (fire-and-forget or immediate
/// return); side effects surface only as emitted events. Implementations
/// expect to run inside a Tokio runtime.
pub trait TelemetrySession: Send + Sync {
    /// Open the session; idempotent while connecting or open
    fn connect(&self);

    /// Cooperative teardown; subscribers stay registered
    fn close(&self);

    /// Teardown plus removal of every subscriber
    fn destroy(&self);

    /// Register a callback for an event kind; the returned id
    /// unsubscribes via `off`
    fn on(&self, kind: EventKind, callback: EventCallback) -> SubscriptionId;

    /// Remove one callback by id
    fn off(&self, kind: EventKind, id: SubscriptionId);

    /// Remove every callback registered for a kind
    fn off_all(&self, kind: EventKind);

    /// Transmit a command while the link is open; dropped with a warning
    /// otherwise
    fn send_command(&self, command: &str, params: Value);

    /// Send the start configuration at most once per opened connection,
    /// buffering it when the link is not open yet
    fn send_start_once(&self, params: Value);
}
