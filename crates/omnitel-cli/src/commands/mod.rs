//! CLI subcommands and the pipeline wiring they share

pub mod config;
pub mod run;
pub mod track;

use std::sync::Arc;

use anyhow::{Context, Result};
use omnitel_core::config::Config;
use omnitel_core::domain::DeliveryOutcome;
use omnitel_core::ports::RequestCallback;
use omnitel_emitter::{EmitterHooks, MetricsRegistry, MetricsServer};
use omnitel_tracker::{install_panic_tracking, Collaborators, ConsentFlag, Tracker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A running tracker plus the metrics endpoint serving it, if enabled.
pub struct Pipeline {
    pub tracker: Arc<Tracker>,
    metrics_shutdown: Option<CancellationToken>,
}

impl Pipeline {
    /// Builds the tracker from `config` with consent set by the caller.
    pub fn start(config: &Config, consent: bool) -> Result<Self> {
        let metrics = if config.metrics.enabled {
            Some(Arc::new(
                MetricsRegistry::new().context("Failed to create metrics registry")?,
            ))
        } else {
            None
        };

        let hooks = EmitterHooks {
            callback: Some(log_outcome()),
            metrics: metrics.clone(),
        };
        let collaborators = Collaborators {
            consent: Arc::new(ConsentFlag::new(consent)),
            ..Collaborators::default()
        };
        let tracker = Arc::new(
            Tracker::from_config(config, collaborators, hooks)
                .context("Failed to start tracker")?,
        );
        install_panic_tracking(&tracker);

        let metrics_shutdown = match metrics {
            Some(metrics) => {
                let server = MetricsServer::new(metrics, &config.metrics.endpoint)?;
                let token = CancellationToken::new();
                let server_token = token.clone();
                tokio::spawn(async move {
                    if let Err(e) = server.run(server_token).await {
                        error!(error = %e, "Metrics server failed");
                    }
                });
                info!(endpoint = %config.metrics.endpoint, "Metrics endpoint enabled");
                Some(token)
            }
            None => None,
        };

        Ok(Self {
            tracker,
            metrics_shutdown,
        })
    }

    /// Flushes and closes the tracker, then stops the metrics endpoint.
    ///
    /// Returns false if deliveries were still pending at the timeout.
    pub async fn stop(self) -> bool {
        let drained = self.tracker.shutdown(self.tracker.flush_timeout()).await;
        if !drained {
            warn!("Flush timed out with deliveries still in flight");
        }
        if let Some(token) = self.metrics_shutdown {
            token.cancel();
        }
        drained
    }
}

fn log_outcome() -> RequestCallback {
    Arc::new(|outcome: &DeliveryOutcome| {
        if outcome.is_success() {
            info!(delivered = outcome.success_count, "Batch delivered");
        } else {
            warn!(
                delivered = outcome.success_count,
                failed = outcome.failure_count,
                "Batch not fully delivered"
            );
        }
    })
}
