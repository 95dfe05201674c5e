//! Event buffer and batch cutting
//!
//! The buffer holds encoded events until they can be cut into a [`Batch`].
//! Two limits bound it: `emit_range` (events per batch) and `byte_limit`
//! (size of the POST body the batch would produce, envelope and sent
//! timestamps included).
//! After every [`EventBuffer::push`] the buffered events are strictly below
//! both limits; anything that reached a limit has already been cut.
//!
//! Batches come out in arrival order. An event too large to share a body
//! with anything else is sent alone, but only after the events that arrived
//! before it have been cut into their own batch.

use omnitel_core::domain::payload::envelope_overhead;
use omnitel_core::domain::{Batch, EventPayload};

/// Size in bytes of a POST body holding `count` stamped events totalling
/// `payload_bytes`.
fn body_size(count: usize, payload_bytes: usize) -> usize {
    envelope_overhead() + payload_bytes + count.saturating_sub(1)
}

/// FIFO buffer of encoded events awaiting batching
#[derive(Debug)]
pub struct EventBuffer {
    emit_range: usize,
    byte_limit: usize,
    events: Vec<EventPayload>,
    payload_bytes: usize,
}

impl EventBuffer {
    pub fn new(emit_range: usize, byte_limit: usize) -> Self {
        Self {
            emit_range: emit_range.max(1),
            byte_limit,
            events: Vec::new(),
            payload_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Size of the POST body the buffered events would produce right now.
    pub fn body_bytes(&self) -> usize {
        if self.events.is_empty() {
            0
        } else {
            body_size(self.events.len(), self.payload_bytes)
        }
    }

    /// Appends an event and returns the batches that became ready, oldest
    /// first.
    pub fn push(&mut self, payload: EventPayload) -> Vec<Batch> {
        let size = payload.stamped_byte_size();
        let mut ready = Vec::new();

        if body_size(1, size) >= self.byte_limit {
            ready.extend(self.drain());
            ready.push(Batch::new(vec![payload]));
            return ready;
        }

        if !self.events.is_empty()
            && body_size(self.events.len() + 1, self.payload_bytes + size) > self.byte_limit
        {
            ready.extend(self.drain());
        }

        self.events.push(payload);
        self.payload_bytes += size;

        if self.events.len() >= self.emit_range || self.body_bytes() >= self.byte_limit {
            ready.extend(self.drain());
        }
        ready
    }

    /// Cuts everything buffered into one batch.
    pub fn drain(&mut self) -> Option<Batch> {
        if self.events.is_empty() {
            return None;
        }
        self.payload_bytes = 0;
        Some(Batch::new(std::mem::take(&mut self.events)))
    }
}
