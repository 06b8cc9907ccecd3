//! # Session Events
//!
//! The closed set of events a session can emit, their payloads, and the
//! per-instance subscription table.
//!
//! Callbacks are invoked synchronously in subscription order. A callback
//! that panics is caught and logged; it never prevents the remaining
//! callbacks from running and never destabilizes session state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::protocol::fields::TelemetryRecord;

/// Event kinds a session can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Status,
    Error,
    Data,
    HistoricalData,
}

impl EventKind {
    /// All kinds, in table order
    pub const ALL: [EventKind; 6] = [
        EventKind::Open,
        EventKind::Close,
        EventKind::Status,
        EventKind::Error,
        EventKind::Data,
        EventKind::HistoricalData,
    ];

    /// Wire name of this kind (the `type` discriminator on frames)
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Status => "status",
            EventKind::Error => "error",
            EventKind::Data => "data",
            EventKind::HistoricalData => "historicalData",
        }
    }

    fn index(self) -> usize {
        match self {
            EventKind::Open => 0,
            EventKind::Close => 1,
            EventKind::Status => 2,
            EventKind::Error => 3,
            EventKind::Data => 4,
            EventKind::HistoricalData => 5,
        }
    }
}

/// Connection state reported on `status` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Closed,
    Error,
}

/// Payload of a `status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StatusPayload {
    pub fn connected() -> Self {
        Self {
            state: ConnectionState::Connected,
            detail: None,
        }
    }

    pub fn closed() -> Self {
        Self {
            state: ConnectionState::Closed,
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Error,
            detail: Some(detail.into()),
        }
    }
}

/// A session event with its typed payload
#[derive(Debug, Clone)]
pub enum Event {
    Open,
    Close,
    Status(StatusPayload),
    Error(String),
    Data(TelemetryRecord),
    HistoricalData(TelemetryRecord),
}

impl Event {
    /// The kind this event dispatches on
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Open => EventKind::Open,
            Event::Close => EventKind::Close,
            Event::Status(_) => EventKind::Status,
            Event::Error(_) => EventKind::Error,
            Event::Data(_) => EventKind::Data,
            Event::HistoricalData(_) => EventKind::HistoricalData,
        }
    }
}

/// Subscriber callback; shared so dispatch can run outside the table lock
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Handle returned by `on()`, used to unsubscribe with `off()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Per-instance table from event kind to ordered callback list.
///
/// Insertion order is invocation order. The table is owned exclusively by
/// its session and destroyed with it.
#[derive(Default)]
pub struct ListenerTable {
    next_id: u64,
    slots: [Vec<(SubscriptionId, EventCallback)>; 6],
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, returning its unsubscribe handle
    pub fn subscribe(&mut self, kind: EventKind, callback: EventCallback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.slots[kind.index()].push((id, callback));
        id
    }

    /// Remove one callback by handle; unknown handles are ignored
    pub fn unsubscribe(&mut self, kind: EventKind, id: SubscriptionId) {
        self.slots[kind.index()].retain(|(sub, _)| *sub != id);
    }

    /// Remove every callback registered for a kind
    pub fn clear_kind(&mut self, kind: EventKind) {
        self.slots[kind.index()].clear();
    }

    /// Remove every callback of every kind
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// True when at least one callback is registered for the kind
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        !self.slots[kind.index()].is_empty()
    }

    /// Snapshot of the callbacks for a kind, in subscription order.
    ///
    /// Dispatch iterates the snapshot after releasing the table lock so a
    /// callback may freely subscribe/unsubscribe without deadlocking.
    pub fn snapshot(&self, kind: EventKind) -> Vec<EventCallback> {
        self.slots[kind.index()]
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect()
    }
}

/// Invoke the snapshot of callbacks for `event`, containing panics.
///
/// A panicking subscriber is logged and skipped; remaining callbacks
/// still run and the fault never reaches session control logic.
pub fn dispatch(callbacks: &[EventCallback], event: &Event) {
    for callback in callbacks {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                "Subscriber for \"{}\" panicked: {}",
                event.kind().as_str(),
                detail
            );
        }
    }
}
