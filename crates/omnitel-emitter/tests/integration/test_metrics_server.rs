//! Metrics endpoint served over real HTTP

use std::sync::Arc;

use omnitel_emitter::{MetricsRegistry, MetricsServer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_scrape_metrics_endpoint() {
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    metrics.record_enqueued();
    metrics.record_dropped("consent");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = MetricsServer::new(Arc::clone(&metrics), &addr.to_string()).unwrap();
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let task = tokio::spawn(async move { server.serve(listener, token).await });

    let body = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("omnitel_events_enqueued_total 1"));
    assert!(body.contains("omnitel_events_dropped_total{reason=\"consent\"} 1"));

    let missing = reqwest::get(format!("http://{addr}/other")).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown.cancel();
    task.await.unwrap().unwrap();
}
