//! HTTP metrics server for Prometheus scraping
//!
//! Serves `GET /metrics` in the text exposition format on the configured
//! `metrics.endpoint`. Every other path answers 404.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::MetricsRegistry;

/// HTTP server exposing a [`MetricsRegistry`].
pub struct MetricsServer {
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
}

impl MetricsServer {
    /// `endpoint` is a socket address such as `"127.0.0.1:9100"`.
    pub fn new(metrics: Arc<MetricsRegistry>, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self { metrics, addr })
    }

    /// Binds the listener, then serves until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Metrics server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    debug!(%peer, "Metrics scrape connection");
                    let io = TokioIo::new(stream);
                    let metrics = Arc::clone(&self.metrics);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let metrics = Arc::clone(&metrics);
                            async move { Ok::<_, hyper::Error>(handle_request(&req, &metrics)) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Metrics HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Metrics server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn respond(status: StatusCode, content_type: &str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if let Ok(value) = hyper::header::HeaderValue::from_str(content_type) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

fn handle_request<B>(req: &Request<B>, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    if req.uri().path() != "/metrics" {
        return respond(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string());
    }

    match metrics.encode() {
        Ok(body) => respond(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            body,
        ),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            format!("Failed to encode metrics: {e}"),
        ),
    }
}
