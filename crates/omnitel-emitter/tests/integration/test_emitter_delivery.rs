//! Emitter against a mock collector: batching, retries, accounting

use std::sync::Arc;

use omnitel_core::config::HttpMethod;
use omnitel_core::domain::DeliveryOutcome;
use omnitel_emitter::{Emitter, EmitterHooks, MetricsRegistry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{payload, recording_callback, sender_for, settings, FLUSH_TIMEOUT, POST_PATH};

#[tokio::test]
async fn test_batches_by_emit_range() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (callback, seen) = recording_callback();
    let emitter = Emitter::new(
        settings(3, 1),
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    for i in 0..4 {
        emitter.enqueue(payload(&i.to_string()));
    }
    assert!(emitter.flush(FLUSH_TIMEOUT).await);

    let mut sizes: Vec<usize> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|o| o.success_count)
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 3]);
}

#[tokio::test]
async fn test_posted_bodies_respect_byte_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let limit = 2_000;
    let mut emitter_settings = settings(500, 1);
    emitter_settings.byte_limit_post = limit;
    let emitter = Emitter::new(
        emitter_settings,
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks::default(),
    )
    .unwrap();

    for i in 0..200 {
        emitter.enqueue(payload(&i.to_string()));
    }
    assert!(emitter.flush(FLUSH_TIMEOUT).await);
    assert_eq!(emitter.stats().events_succeeded, 200);

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests.len() > 1);
    for request in &requests {
        assert!(
            request.body.len() <= limit,
            "body of {} bytes over {limit}",
            request.body.len()
        );
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried_and_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (callback, seen) = recording_callback();
    let emitter = Emitter::new(
        settings(2, 3),
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    emitter.enqueue(payload("a"));
    emitter.enqueue(payload("b"));
    assert!(emitter.flush(FLUSH_TIMEOUT).await);

    assert_eq!(*seen.lock().unwrap(), vec![DeliveryOutcome::success(2)]);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_dead_letter_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let (callback, seen) = recording_callback();
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let emitter = Emitter::new(
        settings(3, 2),
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks {
            callback: Some(callback),
            metrics: Some(Arc::clone(&metrics)),
        },
    )
    .unwrap();

    for i in 0..3 {
        emitter.enqueue(payload(&i.to_string()));
    }
    assert!(emitter.flush(FLUSH_TIMEOUT).await);

    assert_eq!(*seen.lock().unwrap(), vec![DeliveryOutcome::failure(3)]);
    let stats = emitter.stats();
    assert_eq!(stats.events_failed, 3);
    assert_eq!(stats.events_succeeded, 0);
    assert!(metrics
        .encode()
        .unwrap()
        .contains("omnitel_batches_total{result=\"failure\"} 1"));
}

#[tokio::test]
async fn test_rejected_batch_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let (callback, seen) = recording_callback();
    let emitter = Emitter::new(
        settings(1, 5),
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    emitter.enqueue(payload("a"));
    assert!(emitter.flush(FLUSH_TIMEOUT).await);
    assert_eq!(*seen.lock().unwrap(), vec![DeliveryOutcome::rejected(1)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_accounts_for_every_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (callback, seen) = recording_callback();
    let emitter = Emitter::new(
        settings(7, 1),
        Arc::new(sender_for(&server, HttpMethod::Post)),
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    let mut handles = Vec::new();
    for t in 0..8 {
        let emitter = emitter.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                emitter.enqueue(payload(&format!("{t}-{i}")));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(emitter.flush(FLUSH_TIMEOUT).await);

    let stats = emitter.stats();
    assert_eq!(stats.events_enqueued, 200);
    assert_eq!(stats.events_dispatched, 200);
    let delivered: usize = seen.lock().unwrap().iter().map(DeliveryOutcome::total).sum();
    assert_eq!(delivered, 200);
}
