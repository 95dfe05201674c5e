//! HTTP collector transport
//!
//! [`HttpEventSender`] delivers batches to a collector speaking the tracker
//! protocol:
//!
//! - **POST**: one request per batch to `{endpoint}/com.snowplowanalytics.snowplow/tp2`,
//!   the body being a `payload_data` envelope. The collector acknowledges the
//!   body as a whole, so the outcome is all-or-nothing.
//! - **GET**: one request per event to `{endpoint}/i`, the payload carried as
//!   query parameters. Each event is acknowledged on its own, so outcomes
//!   can be partial. At most [`DEFAULT_GET_CONCURRENCY`] requests per batch
//!   are in flight at once.
//!
//! Both paths stamp the sent timestamp (`stm`) at request time. The sender
//! never returns an error: transport failures become failed outcomes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use omnitel_core::config::{HttpMethod, NetworkConfig};
use omnitel_core::domain::payload::payload_data_envelope;
use omnitel_core::domain::{Batch, DeliveryOutcome, EventPayload};
use omnitel_core::ports::IEventSender;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::EmitterError;

/// Collector path for batched POST requests
const POST_PATH: &str = "com.snowplowanalytics.snowplow/tp2";

/// Collector path for single-event GET requests
const GET_PATH: &str = "i";

/// Requests a single GET batch may have in flight
pub const DEFAULT_GET_CONCURRENCY: usize = 4;

/// Statuses that mean the collector will never accept the request
const NON_RETRYABLE_STATUSES: &[u16] = &[400, 401, 403, 410, 422];

/// Result of a single HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Delivered,
    Rejected,
    Failed,
}

impl Attempt {
    fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Attempt::Delivered
        } else if NON_RETRYABLE_STATUSES.contains(&status.as_u16()) {
            Attempt::Rejected
        } else {
            Attempt::Failed
        }
    }
}

/// Sends batches to a collector over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpEventSender {
    client: Client,
    method: HttpMethod,
    post_url: Url,
    get_url: Url,
    get_concurrency: usize,
}

impl HttpEventSender {
    /// Builds a sender from the network section of the configuration.
    pub fn new(network: &NetworkConfig) -> Result<Self, EmitterError> {
        let endpoint = network
            .collector_url()
            .map_err(|e| EmitterError::InvalidEndpoint {
                endpoint: network.endpoint.clone(),
                reason: e.to_string(),
            })?;
        let client = Client::builder()
            .timeout(network.request_timeout())
            .user_agent(concat!("omnitel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, endpoint, network.method)
    }

    /// Builds a sender around an existing client (useful for testing).
    pub fn with_client(
        client: Client,
        endpoint: Url,
        method: HttpMethod,
    ) -> Result<Self, EmitterError> {
        let base = directory_url(endpoint);
        let join = |path: &str| {
            base.join(path).map_err(|e| EmitterError::InvalidEndpoint {
                endpoint: base.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            post_url: join(POST_PATH)?,
            get_url: join(GET_PATH)?,
            client,
            method,
            get_concurrency: DEFAULT_GET_CONCURRENCY,
        })
    }

    /// Builds a POST sender for `endpoint` with the given request timeout.
    pub fn post(endpoint: &str, timeout: Duration) -> Result<Self, EmitterError> {
        let network = NetworkConfig {
            endpoint: endpoint.to_string(),
            method: HttpMethod::Post,
            request_timeout_secs: timeout.as_secs().max(1),
            ..NetworkConfig::default()
        };
        Self::new(&network)
    }

    /// Caps the GET requests one batch keeps in flight (at least 1).
    pub fn with_get_concurrency(mut self, limit: usize) -> Self {
        self.get_concurrency = limit.max(1);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// URL batches are POSTed to
    pub fn post_url(&self) -> &Url {
        &self.post_url
    }

    /// URL single events are sent to with GET
    pub fn get_url(&self) -> &Url {
        &self.get_url
    }

    async fn send_post(&self, batch: &Batch) -> DeliveryOutcome {
        let sent_at = Utc::now().timestamp_millis();
        let events: Vec<EventPayload> = batch
            .events()
            .iter()
            .map(|p| p.with_sent_timestamp(sent_at))
            .collect();
        let body = payload_data_envelope(&events);

        let result = self
            .client
            .post(self.post_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .json(&body)
            .send()
            .await;

        let count = batch.len();
        match result {
            Ok(response) => {
                let status = response.status();
                match Attempt::from_status(status) {
                    Attempt::Delivered => {
                        debug!(batch_id = %batch.id(), events = count, %status, "Batch delivered");
                        DeliveryOutcome::success(count)
                    }
                    Attempt::Rejected => {
                        warn!(batch_id = %batch.id(), events = count, %status, "Collector rejected batch");
                        DeliveryOutcome::rejected(count)
                    }
                    Attempt::Failed => {
                        warn!(batch_id = %batch.id(), events = count, %status, "Collector returned an error");
                        DeliveryOutcome::failure(count)
                    }
                }
            }
            Err(e) => {
                warn!(batch_id = %batch.id(), events = count, error = %e, "Batch request failed");
                DeliveryOutcome::failure(count)
            }
        }
    }

    async fn send_get_one(&self, payload: &EventPayload, sent_at: i64) -> Attempt {
        let stamped = payload.with_sent_timestamp(sent_at);
        let query: Vec<(&String, &String)> = stamped.iter().collect();

        match self
            .client
            .get(self.get_url.clone())
            .query(&query)
            .send()
            .await
        {
            Ok(response) => Attempt::from_status(response.status()),
            Err(e) => {
                debug!(error = %e, "Event request failed");
                Attempt::Failed
            }
        }
    }

    async fn send_get(&self, batch: &Batch) -> DeliveryOutcome {
        let sent_at = Utc::now().timestamp_millis();
        let requests: Vec<_> = batch
            .events()
            .iter()
            .map(|payload| self.send_get_one(payload, sent_at))
            .collect();
        let attempts: Vec<Attempt> = stream::iter(requests)
            .buffer_unordered(self.get_concurrency)
            .collect()
            .await;

        let succeeded = attempts.iter().filter(|a| **a == Attempt::Delivered).count();
        let failed = attempts.len() - succeeded;
        let retryable = attempts.iter().any(|a| *a == Attempt::Failed);

        if failed > 0 {
            warn!(
                batch_id = %batch.id(),
                succeeded,
                failed,
                "Some events were not acknowledged"
            );
        } else {
            debug!(batch_id = %batch.id(), events = succeeded, "Events delivered");
        }
        DeliveryOutcome::partial(succeeded, failed, retryable)
    }
}

#[async_trait]
impl IEventSender for HttpEventSender {
    async fn send(&self, batch: &Batch) -> DeliveryOutcome {
        if batch.is_empty() {
            return DeliveryOutcome::success(0);
        }
        match self.method {
            HttpMethod::Post => self.send_post(batch).await,
            HttpMethod::Get => self.send_get(batch).await,
        }
    }
}

/// Makes sure relative joins append to the endpoint path instead of
/// replacing its last segment.
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
