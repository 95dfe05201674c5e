//! GET transport: one request per event, partial acknowledgement

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use omnitel_core::config::HttpMethod;
use omnitel_core::domain::{Batch, DeliveryOutcome};
use omnitel_core::ports::IEventSender;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::common::{payload, sender_for, GET_PATH};

#[tokio::test]
async fn test_get_sends_one_request_per_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GET_PATH))
        .and(query_param("e", "se"))
        .and(query_param("se_ca", "integration"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Get);
    let batch = Batch::new(vec![payload("a"), payload("b"), payload("c")]);
    assert_eq!(sender.send(&batch).await, DeliveryOutcome::success(3));

    let requests = server.received_requests().await.expect("recording enabled");
    for request in &requests {
        assert!(request.url.query_pairs().any(|(k, _)| k == "stm"));
    }
}

#[tokio::test]
async fn test_get_reports_partial_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GET_PATH))
        .and(query_param("eid", "bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(GET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Get);
    let batch = Batch::new(vec![payload("ok-1"), payload("bad"), payload("ok-2")]);
    let outcome = sender.send(&batch).await;

    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.failure_count, 1);
    assert!(outcome.retryable);
    assert!(!outcome.should_retry());
}

#[tokio::test]
async fn test_get_rejections_are_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GET_PATH))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Get);
    let outcome = sender
        .send(&Batch::new(vec![payload("a"), payload("b")]))
        .await;
    assert_eq!(outcome, DeliveryOutcome::rejected(2));
}

/// Answers after a fixed delay and remembers when each request arrived.
#[derive(Clone)]
struct SlowCollector {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowCollector {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200).set_delay(self.delay)
    }
}

#[tokio::test]
async fn test_get_bounds_requests_in_flight() {
    let server = MockServer::start().await;
    let collector = SlowCollector {
        delay: Duration::from_millis(300),
        arrivals: Arc::new(Mutex::new(Vec::new())),
    };
    Mock::given(method("GET"))
        .and(path(GET_PATH))
        .respond_with(collector.clone())
        .expect(8)
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Get).with_get_concurrency(2);
    let events = (0..8).map(|i| payload(&i.to_string())).collect();
    assert_eq!(sender.send(&Batch::new(events)).await, DeliveryOutcome::success(8));

    // Requests arriving less than one delay apart are in flight together.
    let mut arrivals = collector.arrivals.lock().unwrap().clone();
    arrivals.sort();
    for (i, start) in arrivals.iter().enumerate() {
        let overlapping = arrivals[i..]
            .iter()
            .take_while(|t| t.duration_since(*start) < collector.delay)
            .count();
        assert!(overlapping <= 2, "{overlapping} requests in flight");
    }
}
