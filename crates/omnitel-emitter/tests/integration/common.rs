//! Shared helpers for collector integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use omnitel_core::config::{HttpMethod, NetworkConfig, RetryConfig};
use omnitel_core::domain::{DeliveryOutcome, EventPayload};
use omnitel_core::ports::RequestCallback;
use omnitel_emitter::{EmitterSettings, HttpEventSender};
use wiremock::MockServer;

pub const POST_PATH: &str = "/com.snowplowanalytics.snowplow/tp2";
pub const GET_PATH: &str = "/i";

/// Builds a sender pointed at the mock collector.
pub fn sender_for(server: &MockServer, method: HttpMethod) -> HttpEventSender {
    let network = NetworkConfig {
        endpoint: server.uri(),
        method,
        request_timeout_secs: 5,
        ..NetworkConfig::default()
    };
    HttpEventSender::new(&network).expect("build sender")
}

/// A structured-event payload with a recognisable id.
pub fn payload(eid: &str) -> EventPayload {
    let mut p = EventPayload::new();
    p.insert("e", "se");
    p.insert("eid", eid);
    p.insert("se_ca", "integration");
    p.insert("se_ac", "test");
    p.insert("tna", "appTracker");
    p
}

pub fn settings(emit_range: usize, max_attempts: u32) -> EmitterSettings {
    EmitterSettings {
        thread_pool_size: 4,
        emit_range,
        byte_limit_post: 52_000,
        retry: RetryConfig {
            max_attempts,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
        },
    }
}

/// Callback that stores every outcome it receives.
pub fn recording_callback() -> (RequestCallback, Arc<Mutex<Vec<DeliveryOutcome>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: RequestCallback = Arc::new(move |outcome: &DeliveryOutcome| {
        sink.lock().unwrap().push(*outcome);
    });
    (callback, seen)
}

pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
