//! Pipeline properties: consent, batching, concurrency, failure accounting

use std::sync::Arc;

use omnitel_core::config::GdprConfig;
use omnitel_core::domain::{ContextFragment, DeliveryOutcome, EnrichmentError, Event};
use omnitel_emitter::{EmitterHooks, MetricsRegistry};
use omnitel_tracker::{Collaborators, ConsentFlag, ContextGenerator, Tracker};

use crate::common::{
    recording_callback, test_config, FailingSender, RecordingSender, RecordingSink, TIMEOUT,
};

#[tokio::test]
async fn test_consent_denied_enqueues_nothing() {
    let mut config = test_config();
    config.gdpr = Some(GdprConfig::default());
    let sender = Arc::new(RecordingSender::default());
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let consent = Arc::new(ConsentFlag::new(false));
    let tracker = Tracker::with_sender(
        &config,
        sender.clone(),
        Collaborators {
            consent: consent.clone(),
            ..Collaborators::default()
        },
        EmitterHooks {
            callback: None,
            metrics: Some(Arc::clone(&metrics)),
        },
    )
    .unwrap();

    for _ in 0..5 {
        tracker.track(Event::new("notes", "create"));
    }
    assert!(tracker.flush(TIMEOUT).await);
    assert_eq!(tracker.stats().events_enqueued, 0);
    assert!(sender.events().is_empty());
    assert!(metrics
        .encode()
        .unwrap()
        .contains("omnitel_events_dropped_total{reason=\"consent\"} 5"));

    consent.set(true);
    tracker.track(Event::new("notes", "create"));
    assert!(tracker.flush(TIMEOUT).await);
    assert_eq!(sender.events().len(), 1);
}

#[tokio::test]
async fn test_emit_range_three_forms_one_batch() {
    let mut config = test_config();
    config.emitter.emit_range = 3;
    let sender = Arc::new(RecordingSender::default());
    let tracker = Tracker::with_sender(
        &config,
        sender.clone(),
        Collaborators::default(),
        EmitterHooks::default(),
    )
    .unwrap();

    for i in 0..3 {
        tracker.track(Event::new("notes", "open").with_value(f64::from(i)));
    }
    assert_eq!(tracker.stats().batches_dispatched, 1);

    tracker.track(Event::new("notes", "open"));
    assert_eq!(tracker.stats().buffered, 1);

    assert!(tracker.flush(TIMEOUT).await);
    let mut sizes = sender.batch_sizes();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tracks_are_all_enqueued() {
    let mut config = test_config();
    config.emitter.emit_range = 10;
    let sender = Arc::new(RecordingSender::default());
    let (callback, seen) = recording_callback();
    let tracker = Arc::new(
        Tracker::with_sender(
            &config,
            sender.clone(),
            Collaborators::default(),
            EmitterHooks {
                callback: Some(callback),
                metrics: None,
            },
        )
        .unwrap(),
    );

    let tasks: Vec<_> = (0..10)
        .map(|t| {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                for i in 0..50 {
                    tracker.track(Event::new("load", format!("{t}-{i}")));
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    assert!(tracker.flush(TIMEOUT).await);

    let stats = tracker.stats();
    assert_eq!(stats.events_enqueued, 500);
    assert_eq!(sender.events().len(), 500);
    let reported: usize = seen.lock().unwrap().iter().map(DeliveryOutcome::total).sum();
    assert_eq!(reported as u64, stats.events_dispatched);

    let sessions: std::collections::HashSet<String> = sender
        .events()
        .iter()
        .map(|p| {
            let co: serde_json::Value = serde_json::from_str(p.get("co").unwrap()).unwrap();
            co["data"][0]["data"]["sessionId"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn test_failing_sender_reports_each_batch_in_full() {
    let mut config = test_config();
    config.emitter.emit_range = 4;
    let (callback, seen) = recording_callback();
    let tracker = Tracker::with_sender(
        &config,
        Arc::new(FailingSender),
        Collaborators::default(),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    for _ in 0..10 {
        tracker.track(Event::new("sync", "push"));
    }
    assert!(tracker.flush(TIMEOUT).await);

    let mut failures: Vec<usize> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|o| {
            assert_eq!(o.success_count, 0);
            o.failure_count
        })
        .collect();
    failures.sort_unstable();
    assert_eq!(failures, vec![2, 4, 4]);
    assert_eq!(tracker.stats().events_failed, 10);
}

#[tokio::test(start_paused = true)]
async fn test_retried_batch_reports_once() {
    let mut config = test_config();
    config.emitter.emit_range = 2;
    config.emitter.retry.max_attempts = 3;
    config.emitter.retry.initial_backoff_ms = 100;
    let (callback, seen) = recording_callback();
    let tracker = Tracker::with_sender(
        &config,
        Arc::new(FailingSender),
        Collaborators::default(),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    tracker.track(Event::new("a", "b"));
    tracker.track(Event::new("a", "b"));
    assert!(tracker.flush(TIMEOUT).await);
    assert_eq!(*seen.lock().unwrap(), vec![DeliveryOutcome::failure(2)]);
}

#[tokio::test]
async fn test_failing_generator_does_not_block_event() {
    let sink = Arc::new(RecordingSink::default());
    let sender = Arc::new(RecordingSender::default());
    let mut tracker = Tracker::with_sender(
        &test_config(),
        sender.clone(),
        Collaborators {
            diagnostics: sink.clone(),
            ..Collaborators::default()
        },
        EmitterHooks::default(),
    )
    .unwrap();

    let failing: Arc<dyn ContextGenerator> = Arc::new(
        |_: &Event| -> Result<Vec<ContextFragment>, EnrichmentError> {
            Err(EnrichmentError::Unavailable("network type".into()))
        },
    );
    tracker.register_context("device", vec![failing]).unwrap();

    tracker.track(Event::new("notes", "sync"));
    assert!(tracker.flush(TIMEOUT).await);

    assert_eq!(sender.events().len(), 1);
    let failures = sink.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "device");
}

#[tokio::test]
async fn test_shutdown_stops_tracking() {
    let sender = Arc::new(RecordingSender::default());
    let tracker = Tracker::with_sender(
        &test_config(),
        sender.clone(),
        Collaborators::default(),
        EmitterHooks::default(),
    )
    .unwrap();

    tracker.track(Event::new("a", "b"));
    assert!(tracker.shutdown(TIMEOUT).await);
    tracker.track(Event::new("a", "c"));

    assert_eq!(sender.events().len(), 1);
    assert_eq!(tracker.stats().events_dropped, 1);
}
