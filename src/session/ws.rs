//! # WebSocket Transport Session
//!
//! Owns one physical WebSocket link to the instrument at a time.
//!
//! This module handles:
//! - Idempotent connect and cooperative close/destroy
//! - Automatic reconnection with exponential backoff and jitter
//! - Frame classification through the decoder and normalizer
//! - Typed event dispatch to subscribers
//! - One-time start-configuration handshake per opened connection
//!
//! All public operations are non-blocking; the link itself is driven by a
//! background task that is replaced, never mutated, on each attempt.
//! Concurrent `connect()`/`close()` from uncoordinated callers requires
//! external serialization, per the session contract.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::protocol::decoder::{decode_frame, Decoded};
use crate::protocol::encoder::{encode_command, START_COMMAND};
use crate::protocol::fields::{TelemetryRecord, TYPE_FIELD};
use crate::protocol::normalize::normalize_record;

use super::backoff::BackoffPolicy;
use super::events::{
    dispatch, Event, EventCallback, EventKind, ListenerTable, StatusPayload, SubscriptionId,
};
use super::{SessionState, TelemetrySession};

/// Tuning knobs for a transport session
#[derive(Debug, Clone)]
pub struct WebSocketOptions {
    /// Apply alias normalization to structured frames
    pub normalize: bool,
    /// Log every inbound frame at debug level
    pub debug_frames: bool,
    /// Reconnect delay schedule
    pub backoff: BackoffPolicy,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            debug_frames: true,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Resilient WebSocket session speaking the instrument's event contract
pub struct WebSocketSession {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    normalize: bool,
    debug_frames: bool,
    backoff: BackoffPolicy,
    listeners: Mutex<ListenerTable>,
    link: Mutex<LinkState>,
}

/// Mutable link state, guarded by one mutex that is never held across
/// an await point
struct LinkState {
    state: SessionState,
    /// Bumped whenever a new attempt or a manual close supersedes the
    /// running link task; stale tasks compare and bail out
    generation: u64,
    retries: u32,
    manually_closed: bool,
    /// Start command already sent (or buffered) for this connection
    start_sent: bool,
    pending_start: Option<Value>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    link_task: Option<JoinHandle<()>>,
    /// At most one reconnect timer may be pending at a time
    reconnect_timer: Option<JoinHandle<()>>,
}

impl WebSocketSession {
    /// Create a session for `url`. Nothing happens until `connect()`.
    pub fn new(url: impl Into<String>, options: WebSocketOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                normalize: options.normalize,
                debug_frames: options.debug_frames,
                backoff: options.backoff,
                listeners: Mutex::new(ListenerTable::new()),
                link: Mutex::new(LinkState {
                    state: SessionState::Idle,
                    generation: 0,
                    retries: 0,
                    manually_closed: false,
                    start_sent: false,
                    pending_start: None,
                    outbound: None,
                    link_task: None,
                    reconnect_timer: None,
                }),
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.link.lock().unwrap().state
    }
}

impl TelemetrySession for WebSocketSession {
    /// Open the link. No-op while already connecting or open.
    ///
    /// Must be called from within a Tokio runtime; the link is driven by
    /// a spawned task and this returns immediately.
    fn connect(&self) {
        let mut link = self.shared.link.lock().unwrap();
        if matches!(link.state, SessionState::Connecting | SessionState::Open) {
            info!("WebSocket already connected/connecting: {}", self.shared.url);
            return;
        }
        if let Some(timer) = link.reconnect_timer.take() {
            timer.abort();
        }
        link.manually_closed = false;
        // A new connect cycle discards any configuration buffered for a
        // previous one
        link.pending_start = None;
        spawn_link(&self.shared, &mut link);
    }

    /// Close the link and disable reconnection.
    ///
    /// Subscribers stay registered; use `destroy()` for full teardown.
    fn close(&self) {
        let was_active = {
            let mut link = self.shared.link.lock().unwrap();
            link.manually_closed = true;
            link.generation += 1;
            if let Some(timer) = link.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(task) = link.link_task.take() {
                task.abort();
            }
            link.outbound = None;
            link.retries = 0;
            link.start_sent = false;
            link.pending_start = None;
            let was_active =
                matches!(link.state, SessionState::Connecting | SessionState::Open);
            if was_active {
                link.state = SessionState::Closing;
            }
            was_active
        };

        if was_active {
            info!("WebSocket closed by caller");
            self.shared.emit(Event::Close);
            self.shared.emit(Event::Status(StatusPayload::closed()));
            let mut link = self.shared.link.lock().unwrap();
            // A subscriber may have reconnected from its close callback
            if link.state == SessionState::Closing {
                link.state = SessionState::Closed;
            }
        }
    }

    /// Close and remove every subscriber
    fn destroy(&self) {
        self.close();
        self.shared.listeners.lock().unwrap().clear();
    }

    fn on(&self, kind: EventKind, callback: EventCallback) -> SubscriptionId {
        self.shared.listeners.lock().unwrap().subscribe(kind, callback)
    }

    fn off(&self, kind: EventKind, id: SubscriptionId) {
        self.shared.listeners.lock().unwrap().unsubscribe(kind, id);
    }

    fn off_all(&self, kind: EventKind) {
        self.shared.listeners.lock().unwrap().clear_kind(kind);
    }

    /// Transmit a command while open; otherwise drop it with a warning.
    ///
    /// A command racing a reconnect is routine (a UI action before the
    /// link is back), so this never raises.
    fn send_command(&self, command: &str, params: Value) {
        self.shared.send_command(command, &params);
    }

    /// Send the start configuration exactly once per opened connection.
    ///
    /// Called before the link is open, the parameters are buffered and
    /// flushed on the next open transition; called again after having
    /// sent (or buffered) for the current connection, it is a no-op.
    fn send_start_once(&self, params: Value) {
        let send_now = {
            let mut link = self.shared.link.lock().unwrap();
            if link.start_sent {
                debug!("Start configuration already sent for this connection");
                return;
            }
            link.start_sent = true;
            if link.state == SessionState::Open {
                true
            } else {
                link.pending_start = Some(params.clone());
                false
            }
        };
        if send_now {
            self.shared.send_command(START_COMMAND, &params);
        }
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        // Resource hygiene only: no events once the handle is gone
        let mut link = self.shared.link.lock().unwrap();
        link.generation += 1;
        if let Some(timer) = link.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(task) = link.link_task.take() {
            task.abort();
        }
        link.outbound = None;
    }
}

impl Shared {
    fn emit(&self, event: Event) {
        let snapshot = self.listeners.lock().unwrap().snapshot(event.kind());
        dispatch(&snapshot, &event);
    }

    fn has_subscribers(&self, kind: EventKind) -> bool {
        self.listeners.lock().unwrap().has_subscribers(kind)
    }

    fn send_command(&self, command: &str, params: &Value) {
        let sender = {
            let link = self.link.lock().unwrap();
            if link.state == SessionState::Open {
                link.outbound.clone()
            } else {
                None
            }
        };
        let Some(sender) = sender else {
            warn!("Dropping command \"{}\": WebSocket not open", command);
            return;
        };
        match encode_command(command, params) {
            Ok(text) => {
                if sender.send(text).is_ok() {
                    info!("Command sent: {}", command);
                } else {
                    warn!("Dropping command \"{}\": link is shutting down", command);
                }
            }
            Err(e) => {
                warn!("Failed to encode command \"{}\": {}", command, e);
                self.emit(Event::Error(e.to_string()));
            }
        }
    }

    /// Classify one inbound frame and dispatch the result.
    ///
    /// Undecodable frames are dropped silently: garbage is expected on a
    /// noisy link and must never destabilize the session.
    fn handle_frame(&self, raw: &str) {
        if self.debug_frames {
            debug!("Frame received ({} bytes)", raw.len());
        }
        let Some(decoded) = decode_frame(raw) else {
            debug!("Dropping undecodable frame");
            return;
        };
        match decoded {
            Decoded::Structured(record) => {
                let record = if self.normalize {
                    normalize_record(record)
                } else {
                    record
                };
                self.dispatch_structured(record);
            }
            // Delimited records are canonical by construction and always
            // carry plain telemetry
            Decoded::Delimited(record) => self.emit(Event::Data(record)),
        }
    }

    /// Dispatch a structured record on the kind named by its `type`
    /// field when that kind has a subscriber and is not `data`;
    /// everything else goes out as `data`.
    fn dispatch_structured(&self, record: TelemetryRecord) {
        let declared = record
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .and_then(|name| match name {
                "status" => Some(EventKind::Status),
                "historicalData" => Some(EventKind::HistoricalData),
                "error" => Some(EventKind::Error),
                // "data", lifecycle names and unknown types all carry
                // plain telemetry
                _ => None,
            });

        match declared {
            Some(EventKind::Status) if self.has_subscribers(EventKind::Status) => {
                match serde_json::from_value::<StatusPayload>(Value::Object(record.clone())) {
                    Ok(status) => self.emit(Event::Status(status)),
                    // Malformed status frames are still telemetry-shaped
                    Err(_) => self.emit(Event::Data(record)),
                }
            }
            Some(EventKind::HistoricalData) if self.has_subscribers(EventKind::HistoricalData) => {
                self.emit(Event::HistoricalData(record));
            }
            Some(EventKind::Error) if self.has_subscribers(EventKind::Error) => {
                let detail = record
                    .get("message")
                    .or_else(|| record.get("detail"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(record.clone()).to_string());
                self.emit(Event::Error(detail));
            }
            _ => self.emit(Event::Data(record)),
        }
    }
}

/// Start a fresh link attempt. The caller holds the link lock.
fn spawn_link(shared: &Arc<Shared>, link: &mut LinkState) {
    link.generation += 1;
    let generation = link.generation;
    link.state = SessionState::Connecting;
    link.start_sent = false;
    link.outbound = None;
    if let Some(task) = link.link_task.take() {
        task.abort();
    }
    link.link_task = Some(tokio::spawn(run_link(Arc::clone(shared), generation)));
}

/// Drive one physical connection from handshake to close
async fn run_link(shared: Arc<Shared>, generation: u64) {
    info!("Connecting WebSocket to {}", shared.url);

    let stream = match connect_async(shared.url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("WebSocket connect failed: {}", e);
            shared.emit(Event::Error(e.to_string()));
            shared.emit(Event::Status(StatusPayload::error(e.to_string())));
            finish_link(&shared, generation);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let flush = {
        let mut link = shared.link.lock().unwrap();
        if link.generation != generation {
            // Superseded while handshaking; the new owner drives events
            return;
        }
        link.state = SessionState::Open;
        link.retries = 0;
        link.outbound = Some(outbound_tx);
        match link.pending_start.take() {
            Some(params) => {
                link.start_sent = true;
                Some(params)
            }
            None => None,
        }
    };

    info!("WebSocket connected");
    shared.emit(Event::Open);
    shared.emit(Event::Status(StatusPayload::connected()));

    if let Some(params) = flush {
        shared.send_command(START_COMMAND, &params);
    }

    let (mut sink, mut inbound) = stream.split();
    loop {
        tokio::select! {
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(raw))) => shared.handle_frame(&raw),
                Some(Ok(Message::Close(_))) | None => break,
                // Binary/ping/pong frames are not telemetry
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // Surfaced as events; the link's own close signal
                    // below drives the actual teardown
                    warn!("WebSocket error: {}", e);
                    shared.emit(Event::Error(e.to_string()));
                    shared.emit(Event::Status(StatusPayload::error(e.to_string())));
                    break;
                }
            },
            command = outbound_rx.recv() => match command {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!("WebSocket send failed: {}", e);
                        shared.emit(Event::Error(e.to_string()));
                        shared.emit(Event::Status(StatusPayload::error(e.to_string())));
                    }
                }
                None => {
                    // Writer dropped during teardown
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }

    finish_link(&shared, generation);
}

/// Record the close, emit close events, and schedule exactly one
/// reconnect attempt unless the close was caller-initiated
fn finish_link(shared: &Arc<Shared>, generation: u64) {
    {
        let mut link = shared.link.lock().unwrap();
        if link.generation != generation {
            // A newer connect() or close() owns the state now
            return;
        }
        link.outbound = None;
        link.state = SessionState::Closed;
        link.start_sent = false;

        if link.manually_closed {
            link.retries = 0;
        } else {
            let delay = shared.backoff.delay(link.retries);
            warn!(
                "WebSocket closed, reconnecting in {:?} (retry {})",
                delay, link.retries
            );
            link.retries += 1;
            // Cancel-before-reschedule keeps the single-timer invariant
            if let Some(timer) = link.reconnect_timer.take() {
                timer.abort();
            }
            let shared = Arc::clone(shared);
            link.reconnect_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                fire_reconnect(&shared);
            }));
        }
    }

    shared.emit(Event::Close);
    shared.emit(Event::Status(StatusPayload::closed()));
}

/// Reconnect timer expiry: start a new attempt unless the session was
/// closed or reconnected in the meantime
fn fire_reconnect(shared: &Arc<Shared>) {
    let mut link = shared.link.lock().unwrap();
    link.reconnect_timer = None;
    if link.manually_closed
        || matches!(link.state, SessionState::Connecting | SessionState::Open)
    {
        return;
    }
    info!("Reconnecting WebSocket to {}", shared.url);
    spawn_link(shared, &mut link);
}
