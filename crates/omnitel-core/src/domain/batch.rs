//! Batches and delivery outcomes
//!
//! A [`Batch`] is the unit of delivery: the emitter cuts one from its buffer,
//! a sender transmits it, and the result comes back as a [`DeliveryOutcome`].
//! Outcomes are batch-granular; individual events are not tracked.

use serde::{Deserialize, Serialize};

use super::newtypes::BatchId;
use super::payload::EventPayload;

/// An ordered group of encoded events sent in one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    events: Vec<EventPayload>,
}

impl Batch {
    pub fn new(events: Vec<EventPayload>) -> Self {
        Self {
            id: BatchId::new(),
            events,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn events(&self) -> &[EventPayload] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of the serialized sizes of the events, excluding the envelope
    pub fn payload_bytes(&self) -> usize {
        self.events.iter().map(EventPayload::byte_size).sum()
    }
}

/// Result of one delivery attempt for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Events acknowledged by the collector
    pub success_count: usize,
    /// Events that were not delivered
    pub failure_count: usize,
    /// Whether the failed part may succeed if sent again
    pub retryable: bool,
}

impl DeliveryOutcome {
    /// All `count` events were delivered
    pub fn success(count: usize) -> Self {
        Self {
            success_count: count,
            failure_count: 0,
            retryable: false,
        }
    }

    /// All `count` events failed with a transient error
    pub fn failure(count: usize) -> Self {
        Self {
            success_count: 0,
            failure_count: count,
            retryable: true,
        }
    }

    /// All `count` events were refused and must not be sent again
    pub fn rejected(count: usize) -> Self {
        Self {
            success_count: 0,
            failure_count: count,
            retryable: false,
        }
    }

    /// Per-item acknowledgement result
    pub fn partial(success_count: usize, failure_count: usize, retryable: bool) -> Self {
        Self {
            success_count,
            failure_count,
            retryable: retryable && failure_count > 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// True when nothing was delivered and the failure is transient
    pub fn should_retry(&self) -> bool {
        self.success_count == 0 && self.failure_count > 0 && self.retryable
    }
}
