//! POST transport: body envelope and status handling

use omnitel_core::config::HttpMethod;
use omnitel_core::domain::schemas;
use omnitel_core::domain::{Batch, DeliveryOutcome};
use omnitel_core::ports::IEventSender;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{payload, sender_for, POST_PATH};

#[tokio::test]
async fn test_post_sends_payload_data_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .and(header("content-type", "application/json; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Post);
    let batch = Batch::new(vec![payload("a"), payload("b"), payload("c")]);
    let outcome = sender.send(&batch).await;
    assert_eq!(outcome, DeliveryOutcome::success(3));

    let requests = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = requests[0].body_json().expect("json body");
    assert_eq!(body["schema"], schemas::PAYLOAD_DATA);
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["eid"], "a");
    assert_eq!(data[2]["eid"], "c");
    for event in data {
        let stm = event["stm"].as_str().expect("stm stamped");
        assert!(stm.parse::<i64>().is_ok());
    }
}

#[tokio::test]
async fn test_post_server_error_is_retryable_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(POST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sender = sender_for(&server, HttpMethod::Post);
    let outcome = sender
        .send(&Batch::new(vec![payload("a"), payload("b")]))
        .await;
    assert_eq!(outcome, DeliveryOutcome::failure(2));
    assert!(outcome.should_retry());
}

#[tokio::test]
async fn test_post_client_errors_are_rejections() {
    for status in [400u16, 401, 403, 410, 422] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POST_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let sender = sender_for(&server, HttpMethod::Post);
        let outcome = sender.send(&Batch::new(vec![payload("a")])).await;
        assert_eq!(outcome, DeliveryOutcome::rejected(1), "status {status}");
    }
}

#[tokio::test]
async fn test_post_unreachable_collector_is_retryable() {
    let server = MockServer::start().await;
    let sender = sender_for(&server, HttpMethod::Post);
    drop(server);

    let outcome = sender.send(&Batch::new(vec![payload("a")])).await;
    assert_eq!(outcome.failure_count, 1);
    assert!(outcome.retryable);
}
