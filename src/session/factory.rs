//! # Session Factory
//!
//! Chooses the transport or synthetic session from configuration. The
//! protocol logic does not depend on which one comes back: both speak
//! the same event/command contract.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;

use super::mock::{MockOptions, MockSession};
use super::ws::{WebSocketOptions, WebSocketSession};
use super::TelemetrySession;

/// Build the session described by `config`
pub fn create_session(config: &Config) -> Arc<dyn TelemetrySession> {
    if config.mock.enabled {
        info!("Using synthetic telemetry session (mock mode)");
        Arc::new(MockSession::new(MockOptions {
            frequency_hz: config.mock.frequency_hz,
            min_period: Duration::from_millis(config.mock.min_period_ms),
        }))
    } else {
        info!("Using WebSocket telemetry session: {}", config.link.url);
        Arc::new(WebSocketSession::new(
            config.link.url.clone(),
            WebSocketOptions {
                normalize: config.link.normalize,
                debug_frames: config.link.debug_frames,
                backoff: config.backoff_policy(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::{Event, EventKind};
    use std::sync::Mutex;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_mock_mode_produces_data_without_network() {
        let mut config = Config::default();
        config.mock.enabled = true;
        config.mock.frequency_hz = 50.0;
        config.mock.min_period_ms = 10;

        let session = create_session(&config);
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        session.on(EventKind::Data, Arc::new(move |event| {
            if let Event::Data(record) = event {
                sink.lock().unwrap().push(record.clone());
            }
        }));

        session.connect();
        timeout(Duration::from_secs(5), async {
            while records.lock().unwrap().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("no synthetic telemetry produced");
        session.destroy();
    }

    #[tokio::test]
    async fn test_transport_mode_reports_unreachable_instrument() {
        let mut config = Config::default();
        // Nothing listens here; expect an error event, not a panic
        config.link.url = "ws://127.0.0.1:1/ws".to_string();

        let session = create_session(&config);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        session.on(EventKind::Error, Arc::new(move |event| {
            if let Event::Error(detail) = event {
                sink.lock().unwrap().push(detail.clone());
            }
        }));

        session.connect();
        timeout(Duration::from_secs(5), async {
            while errors.lock().unwrap().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("unreachable instrument produced no error event");
        session.destroy();
    }
}
