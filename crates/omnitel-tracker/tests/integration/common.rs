//! Shared senders, sinks and config helpers for tracker integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use omnitel_core::config::Config;
use omnitel_core::domain::{Batch, DeliveryOutcome, EnrichmentError, EventPayload};
use omnitel_core::ports::{IDiagnosticSink, IEventSender, RequestCallback};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Records every batch and acknowledges it.
#[derive(Default)]
pub struct RecordingSender {
    pub batches: Mutex<Vec<Vec<EventPayload>>>,
}

impl RecordingSender {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn events(&self) -> Vec<EventPayload> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl IEventSender for RecordingSender {
    async fn send(&self, batch: &Batch) -> DeliveryOutcome {
        self.batches.lock().unwrap().push(batch.events().to_vec());
        DeliveryOutcome::success(batch.len())
    }
}

/// Fails every batch with a transient error.
#[derive(Default)]
pub struct FailingSender;

#[async_trait]
impl IEventSender for FailingSender {
    async fn send(&self, batch: &Batch) -> DeliveryOutcome {
        DeliveryOutcome::failure(batch.len())
    }
}

/// Collects enrichment failures.
#[derive(Default)]
pub struct RecordingSink {
    pub failures: Mutex<Vec<(String, EnrichmentError)>>,
}

impl IDiagnosticSink for RecordingSink {
    fn enrichment_failed(&self, rule_set: &str, error: &EnrichmentError) {
        self.failures
            .lock()
            .unwrap()
            .push((rule_set.to_string(), error.clone()));
    }
}

/// Config with host-dependent contexts off and retries disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tracker.platform_context = false;
    config.emitter.retry.max_attempts = 1;
    config
}

pub fn recording_callback() -> (RequestCallback, Arc<Mutex<Vec<DeliveryOutcome>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: RequestCallback = Arc::new(move |outcome: &DeliveryOutcome| {
        sink.lock().unwrap().push(*outcome);
    });
    (callback, seen)
}
