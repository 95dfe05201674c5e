//! Retry loop around a sender
//!
//! Only batches that failed entirely with a transient error are sent again.
//! Partial outcomes and permanent rejections are terminal on the first
//! attempt. When the attempt budget runs out the last outcome is returned
//! and the caller dead-letters the batch.

use omnitel_core::config::RetryConfig;
use omnitel_core::domain::{Batch, DeliveryOutcome};
use omnitel_core::ports::IEventSender;
use tracing::{debug, info, warn};

/// Terminal result of delivering one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub outcome: DeliveryOutcome,
    /// Number of send attempts made, at least 1
    pub attempts: u32,
}

impl Delivery {
    /// True when the batch failed and will not be sent again.
    pub fn is_dead_lettered(&self) -> bool {
        self.outcome.success_count == 0 && self.outcome.failure_count > 0
    }
}

/// Sends `batch`, retrying transient total failures per `policy`.
pub async fn deliver_with_retry(
    sender: &dyn IEventSender,
    batch: &Batch,
    policy: &RetryConfig,
) -> Delivery {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = sender.send(batch).await;

        if !outcome.should_retry() {
            if attempt > 1 && outcome.success_count > 0 {
                info!(batch_id = %batch.id(), attempt, "Batch delivered after retry");
            }
            return Delivery {
                outcome,
                attempts: attempt,
            };
        }

        if attempt >= max_attempts {
            warn!(
                batch_id = %batch.id(),
                events = batch.len(),
                attempts = attempt,
                "Retry limit exhausted, dropping batch"
            );
            return Delivery {
                outcome,
                attempts: attempt,
            };
        }

        let backoff = policy.backoff_for(attempt);
        debug!(
            batch_id = %batch.id(),
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            "Batch delivery failed, retrying"
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
