//! Run command - emit a steady stream of events until interrupted
//!
//! Useful for exercising a collector and watching the metrics endpoint.
//! On SIGINT or SIGTERM the tracker is flushed before exit.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use omnitel_core::domain::Event;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Pipeline;
use crate::output::{get_formatter, OutputFormat};
use crate::ConfigSource;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Milliseconds between events
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many events
    #[arg(long)]
    pub limit: Option<u64>,

    /// Event category
    #[arg(long, default_value = "omnitel")]
    pub category: String,

    /// Event action
    #[arg(long, default_value = "heartbeat")]
    pub action: String,

    /// Grant tracking consent for this run
    #[arg(long)]
    pub consent: bool,
}

impl RunCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = source.load()?;
        let pipeline = Pipeline::start(&config, self.consent)?;

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        if !format.is_json() {
            formatter.success(&format!(
                "Sending {}/{} every {}ms (Ctrl+C to stop)",
                self.category, self.action, self.interval_ms
            ));
        }

        let mut ticker = tokio::time::interval(Duration::from_millis(self.interval_ms.max(1)));
        let mut sent: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    sent += 1;
                    pipeline.tracker.track(
                        Event::new(&self.category, &self.action).with_property("sequence", sent),
                    );
                    if self.limit.is_some_and(|limit| sent >= limit) {
                        break;
                    }
                }
            }
        }

        info!(sent, "Stopping event stream");
        let tracker = pipeline.tracker.clone();
        let drained = pipeline.stop().await;
        let stats = tracker.stats();

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "sent": sent,
                "drained": drained,
                "stats": stats,
            }));
        } else {
            formatter.success(&format!("Stopped after {} events", sent));
            formatter.stats(&stats);
        }
        Ok(())
    }
}

/// Cancels `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
