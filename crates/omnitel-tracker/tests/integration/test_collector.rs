//! Tracker against a mock collector over HTTP

use std::sync::Arc;

use omnitel_core::config::{GdprConfig, HttpMethod};
use omnitel_core::domain::{schemas, Event};
use omnitel_emitter::EmitterHooks;
use omnitel_tracker::{Collaborators, ConsentFlag, Tracker};
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{recording_callback, test_config, TIMEOUT};

#[tokio::test]
async fn test_post_delivers_decorated_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/com.snowplowanalytics.snowplow/tp2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.network.endpoint = server.uri();
    config.gdpr = Some(GdprConfig::default());
    let (callback, seen) = recording_callback();
    let tracker = Tracker::from_config(
        &config,
        Collaborators {
            consent: Arc::new(ConsentFlag::new(true)),
            ..Collaborators::default()
        },
        EmitterHooks {
            callback: Some(callback),
            metrics: None,
        },
    )
    .unwrap();

    tracker.track(
        Event::new("Category_example", "Action_example")
            .with_label("Label_example")
            .with_value(12.0)
            .with_property("notes", 3),
    );
    tracker.track(Event::new("Category_example", "Action_example"));
    assert!(tracker.shutdown(TIMEOUT).await);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(seen.lock().unwrap()[0].is_success());

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["schema"], schemas::PAYLOAD_DATA);
    let first = &body["data"][0];
    assert_eq!(first["e"], "se");
    assert_eq!(first["se_la"], "Label_example");
    assert_eq!(first["se_va"], "12");
    assert!(first["stm"].is_string());

    let properties: Value = serde_json::from_str(first["se_pr"].as_str().unwrap()).unwrap();
    assert_eq!(properties["notes"], 3);

    let contexts: Value = serde_json::from_str(first["co"].as_str().unwrap()).unwrap();
    let schemas_seen: Vec<&str> = contexts["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["schema"].as_str().unwrap())
        .collect();
    assert_eq!(
        schemas_seen,
        vec![schemas::CLIENT_SESSION, schemas::GDPR, schemas::APPLICATION]
    );
    assert_eq!(contexts["data"][1]["data"]["documentId"], "someId");
    assert_eq!(contexts["data"][0]["data"]["sessionIndex"], 1);
}

#[tokio::test]
async fn test_get_sends_each_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/i"))
        .and(query_param("tna", "appTracker"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.network.endpoint = server.uri();
    config.network.method = HttpMethod::Get;
    config.emitter.emit_range = 3;
    let tracker =
        Tracker::from_config(&config, Collaborators::default(), EmitterHooks::default()).unwrap();

    for action in ["open", "edit", "close"] {
        tracker.track(Event::new("notes", action));
    }
    assert!(tracker.flush(TIMEOUT).await);
    assert_eq!(tracker.stats().events_succeeded, 3);
}

#[tokio::test]
async fn test_collector_outage_is_counted_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.network.endpoint = server.uri();
    config.emitter.emit_range = 2;
    let tracker =
        Tracker::from_config(&config, Collaborators::default(), EmitterHooks::default()).unwrap();

    for _ in 0..4 {
        tracker.track(Event::new("notes", "open"));
    }
    assert!(tracker.flush(TIMEOUT).await);

    let stats = tracker.stats();
    assert_eq!(stats.events_failed, 4);
    assert_eq!(stats.batches_completed, 2);
}
