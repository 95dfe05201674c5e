//! Event sender port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - `send` never returns an error. Transport failures are encoded in the
//!   returned [`DeliveryOutcome`] so the emitter has a single accounting path.
//! - Implementations must be safe to call from many workers at once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Batch, DeliveryOutcome};

/// Transmits batches of encoded events to a collector
#[async_trait]
pub trait IEventSender: Send + Sync {
    /// Sends one batch and reports how many events were acknowledged.
    async fn send(&self, batch: &Batch) -> DeliveryOutcome;
}

/// Invoked once per batch with its terminal delivery outcome.
pub type RequestCallback = Arc<dyn Fn(&DeliveryOutcome) + Send + Sync>;
