//! # Synthetic Telemetry Session
//!
//! Implements the session contract without a physical link, generating
//! plausible telemetry on a timer. Useful for developing and testing the
//! presentation layer with no instrument attached.
//!
//! Samples follow a fixed closed path off the Adriatic coast with small
//! positional jitter; acceleration components are drawn from independent
//! normal distributions (the vertical axis centered at 1 g), and severity
//! is classified by threshold on the acceleration magnitude.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::fields::{classify_magnitude, TelemetryRecord};

use super::events::{
    dispatch, Event, EventCallback, EventKind, ListenerTable, StatusPayload, SubscriptionId,
};
use super::{SessionState, TelemetrySession};

/// Closed route the synthetic instrument follows, roughly 15 km east of
/// Ancona, one waypoint per tick
const ROUTE: &[(f64, f64)] = &[
    (43.7000, 13.5000),
    (43.7200, 13.5200),
    (43.7400, 13.5400),
    (43.7600, 13.5600),
    (43.7800, 13.5800),
    (43.8000, 13.6000),
    (43.8200, 13.6200),
    (43.8400, 13.6400),
];

/// Positional jitter applied to each waypoint (degrees)
const POSITION_JITTER_DEG: f64 = 0.0005;

/// Standard deviation of each acceleration axis (g)
const ACCEL_SIGMA: f64 = 0.35;

/// Tuning knobs for a synthetic session
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Samples per second; `send_start_once({"freq": ..})` overrides this
    pub frequency_hz: f64,
    /// Floor for the tick period regardless of requested frequency
    pub min_period: Duration,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            min_period: Duration::from_millis(100),
        }
    }
}

/// Synthetic session generating telemetry on a timer
pub struct MockSession {
    shared: Arc<MockShared>,
}

struct MockShared {
    min_period: Duration,
    listeners: Mutex<ListenerTable>,
    inner: Mutex<MockInner>,
}

struct MockInner {
    state: SessionState,
    /// Bumped on every timer (re)start so stale tickers bail out
    generation: u64,
    frequency_hz: f64,
    ticker: Option<JoinHandle<()>>,
    route_index: usize,
    packet_index: u64,
}

impl MockSession {
    pub fn new(options: MockOptions) -> Self {
        Self {
            shared: Arc::new(MockShared {
                min_period: options.min_period,
                listeners: Mutex::new(ListenerTable::new()),
                inner: Mutex::new(MockInner {
                    state: SessionState::Idle,
                    generation: 0,
                    frequency_hz: options.frequency_hz.max(f64::MIN_POSITIVE),
                    ticker: None,
                    route_index: 0,
                    packet_index: 0,
                }),
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().unwrap().state
    }
}

impl TelemetrySession for MockSession {
    /// Start generating samples. No-op while already connected.
    fn connect(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state == SessionState::Open {
                info!("Synthetic session already connected");
                return;
            }
            inner.state = SessionState::Open;
            start_ticker(&self.shared, &mut inner);
        }
        info!("Synthetic session started");
        self.shared.emit(Event::Open);
        self.shared.emit(Event::Status(StatusPayload::connected()));
    }

    /// Stop the timer and report the close
    fn close(&self) {
        let was_open = {
            let mut inner = self.shared.inner.lock().unwrap();
            let was_open = inner.state == SessionState::Open;
            inner.generation += 1;
            if let Some(ticker) = inner.ticker.take() {
                ticker.abort();
            }
            if was_open {
                inner.state = SessionState::Closed;
            }
            was_open
        };
        if was_open {
            info!("Synthetic session stopped");
            self.shared.emit(Event::Close);
            self.shared.emit(Event::Status(StatusPayload::closed()));
        }
    }

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

    /// There is no link; commands are acknowledged in the log only
    fn send_command(&self, command: &str, _params: Value) {
        debug!("Synthetic session ignoring command: {}", command);
    }

    /// Adopt a new sampling frequency from the start configuration,
    /// atomically restarting the tick timer at the new period
    fn send_start_once(&self, params: Value) {
        let Some(freq) = params.get("freq").and_then(Value::as_f64) else {
            debug!("Start configuration without freq; keeping current rate");
            return;
        };
        if !freq.is_finite() || freq <= 0.0 {
            warn!("Ignoring invalid sampling frequency: {}", freq);
            return;
        }
        let mut inner = self.shared.inner.lock().unwrap();
        inner.frequency_hz = freq;
        if inner.state == SessionState::Open {
            start_ticker(&self.shared, &mut inner);
        }
        info!("Synthetic sampling frequency set to {} Hz", freq);
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.generation += 1;
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
    }
}

impl MockShared {
    fn emit(&self, event: Event) {
        let snapshot = self.listeners.lock().unwrap().snapshot(event.kind());
        dispatch(&snapshot, &event);
    }

    /// Tick period honoring the minimum: `max(min_period, 1000/freq)`
    fn tick_period(&self, frequency_hz: f64) -> Duration {
        let millis = (1_000.0 / frequency_hz).max(self.min_period.as_millis() as f64);
        Duration::from_millis(millis.round() as u64)
    }
}

/// (Re)start the sample timer. The caller holds the inner lock.
fn start_ticker(shared: &Arc<MockShared>, inner: &mut MockInner) {
    inner.generation += 1;
    let generation = inner.generation;
    let period = shared.tick_period(inner.frequency_hz);
    if let Some(ticker) = inner.ticker.take() {
        ticker.abort();
    }
    let shared = Arc::clone(shared);
    inner.ticker = Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticks = tokio::time::interval_at(start, period);
        loop {
            ticks.tick().await;
            let record = {
                let mut inner = shared.inner.lock().unwrap();
                if inner.generation != generation || inner.state != SessionState::Open {
                    return;
                }
                next_record(&mut inner)
            };
            shared.emit(Event::Data(record));
        }
    }));
}

/// Produce the next synthetic sample, advancing the route cursor
fn next_record(inner: &mut MockInner) -> TelemetryRecord {
    let mut rng = rand::thread_rng();

    let (lat, lon) = ROUTE[inner.route_index];
    inner.route_index = (inner.route_index + 1) % ROUTE.len();
    inner.packet_index += 1;

    let latitude = lat + rng.gen_range(-POSITION_JITTER_DEG..POSITION_JITTER_DEG);
    let longitude = lon + rng.gen_range(-POSITION_JITTER_DEG..POSITION_JITTER_DEG);

    // Lateral axes hover around zero; the vertical axis is centered at
    // 1 g so the magnitude sits near the verde band at rest
    let lateral = Normal::new(0.0, ACCEL_SIGMA).expect("valid distribution");
    let vertical = Normal::new(1.0, ACCEL_SIGMA).expect("valid distribution");
    let accel_x = round2(lateral.sample(&mut rng));
    let accel_y = round2(lateral.sample(&mut rng));
    let accel_z = round2(vertical.sample(&mut rng));
    let accel_sum = round2((accel_x * accel_x + accel_y * accel_y + accel_z * accel_z).sqrt());
    let severity = classify_magnitude(accel_sum);

    let attitude = Normal::new(0.0, 4.0).expect("valid distribution");

    let record = json!({
        "type": "data",
        "DateTime": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "PacketIdx": inner.packet_index,
        "AccelX": accel_x,
        "AccelY": accel_y,
        "AccelZ": accel_z,
        "AccelSum": accel_sum,
        "Pitch": round2(attitude.sample(&mut rng)),
        "Roll": round2(attitude.sample(&mut rng)),
        "Yaw": round2(rng.gen_range(0.0..360.0)),
        "Speed": rng.gen_range(10i64..=50),
        "Latitude": latitude,
        "Longitude": longitude,
        "EventClass": severity.code(),
        "EventClassText": severity.as_str(),
    });
    match record {
        Value::Object(map) => map,
        _ => unreachable!("synthetic record is always an object"),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout};

    fn collect_data(session: &MockSession) -> Arc<Mutex<Vec<TelemetryRecord>>> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        session.on(EventKind::Data, Arc::new(move |event| {
            if let Event::Data(record) = event {
                sink.lock().unwrap().push(record.clone());
            }
        }));
        collected
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn fast_session() -> MockSession {
        MockSession::new(MockOptions {
            frequency_hz: 50.0,
            min_period: Duration::from_millis(10),
        })
    }

    #[tokio::test]
    async fn test_connect_emits_open_then_ticks() {
        let session = fast_session();
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        session.on(EventKind::Open, Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let data = collect_data(&session);

        session.connect();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Open);

        wait_for(|| data.lock().unwrap().len() >= 3).await;
        session.close();
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let session = fast_session();
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        session.on(EventKind::Open, Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        session.connect();
        session.connect();
        session.connect();
        assert_eq!(opens.load(Ordering::SeqCst), 1, "connect must be idempotent");
        session.close();
    }

    #[tokio::test]
    async fn test_record_shape_and_classification() {
        let session = fast_session();
        let data = collect_data(&session);

        session.connect();
        wait_for(|| data.lock().unwrap().len() >= 5).await;
        session.close();

        let records = data.lock().unwrap();
        for record in records.iter() {
            for field in [
                "DateTime", "PacketIdx", "AccelX", "AccelY", "AccelZ", "AccelSum",
                "Pitch", "Roll", "Yaw", "Speed", "Latitude", "Longitude",
                "EventClass", "EventClassText",
            ] {
                assert!(record.contains_key(field), "missing field {field}");
            }

            // Severity must agree with the magnitude thresholds
            let magnitude = record["AccelSum"].as_f64().unwrap();
            let label = record["EventClassText"].as_str().unwrap();
            assert_eq!(label, classify_magnitude(magnitude).as_str());

            let speed = record["Speed"].as_i64().unwrap();
            assert!((10..=50).contains(&speed));
        }

        // Packet index is monotonically increasing
        let indices: Vec<u64> = records
            .iter()
            .map(|r| r["PacketIdx"].as_u64().unwrap())
            .collect();
        assert!(indices.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[tokio::test]
    async fn test_route_cycles_through_waypoints() {
        let session = fast_session();
        let data = collect_data(&session);

        session.connect();
        wait_for(|| data.lock().unwrap().len() >= ROUTE.len() + 1).await;
        session.close();

        let records = data.lock().unwrap();
        // Sample N+1 is near the same waypoint as sample 1
        let first = records[0]["Latitude"].as_f64().unwrap();
        let wrapped = records[ROUTE.len()]["Latitude"].as_f64().unwrap();
        assert!((first - wrapped).abs() < 4.0 * POSITION_JITTER_DEG);
    }

    #[tokio::test]
    async fn test_start_once_changes_frequency() {
        let session = MockSession::new(MockOptions {
            frequency_hz: 0.01, // one sample every 100 s: effectively silent
            min_period: Duration::from_millis(10),
        });
        let data = collect_data(&session);

        session.connect();
        sleep(Duration::from_millis(50)).await;
        assert!(data.lock().unwrap().is_empty());

        // Speeding up takes effect immediately
        session.send_start_once(serde_json::json!({"freq": 100}));
        wait_for(|| data.lock().unwrap().len() >= 3).await;
        session.close();
    }

    #[tokio::test]
    async fn test_min_period_floors_frequency() {
        let session = MockSession::new(MockOptions {
            frequency_hz: 1.0,
            min_period: Duration::from_millis(40),
        });
        assert_eq!(
            session.shared.tick_period(1_000_000.0),
            Duration::from_millis(40)
        );
        assert_eq!(session.shared.tick_period(1.0), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_invalid_frequency_ignored() {
        let session = fast_session();
        session.connect();
        session.send_start_once(serde_json::json!({"freq": 0}));
        session.send_start_once(serde_json::json!({"freq": -5}));
        session.send_start_once(serde_json::json!({}));
        // Still alive and ticking at the configured rate
        let data = collect_data(&session);
        wait_for(|| !data.lock().unwrap().is_empty()).await;
        session.close();
    }

    #[tokio::test]
    async fn test_close_stops_ticks_and_reports() {
        let session = fast_session();
        let data = collect_data(&session);
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        session.on(EventKind::Close, Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        session.connect();
        wait_for(|| !data.lock().unwrap().is_empty()).await;
        session.close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Closed);

        // Let any in-flight tick drain before sampling the count
        sleep(Duration::from_millis(20)).await;
        let settled = data.lock().unwrap().len();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(data.lock().unwrap().len(), settled, "ticker survived close");
    }

    #[tokio::test]
    async fn test_close_without_connect_is_silent() {
        let session = fast_session();
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        session.on(EventKind::Close, Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        session.close();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }
}
