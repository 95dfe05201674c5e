//! Batching emitter
//!
//! ## Architecture
//!
//! ```text
//!   enqueue(payload) ──► EventBuffer (mutex) ──► Batch ──► TaskTracker
//!                                                            │ spawn_on(handle)
//!                                                            ▼
//!                                         Semaphore(thread_pool_size)
//!                                                            │
//!                                                            ▼
//!                                         deliver_with_retry(sender)
//!                                                            │
//!                                                            ▼
//!                                      counters + metrics + RequestCallback
//! ```
//!
//! `enqueue` never waits on the network. Cut batches are spawned on the
//! runtime captured at construction; at most `thread_pool_size` of them
//! talk to the sender at once and each completes independently.
//!
//! ## Accounting
//!
//! Every batch that leaves the buffer ends with exactly one terminal
//! [`DeliveryOutcome`] whose counts add up to the batch size. That outcome
//! feeds the cumulative counters and is passed once to the
//! [`RequestCallback`].

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use omnitel_core::config::{EmitterConfig, RetryConfig};
use omnitel_core::domain::payload::envelope_overhead;
use omnitel_core::domain::{Batch, DeliveryOutcome, EventPayload};
use omnitel_core::ports::{IEventSender, RequestCallback};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::buffer::EventBuffer;
use crate::error::EmitterError;
use crate::metrics::MetricsRegistry;
use crate::retry::deliver_with_retry;

/// Batching and concurrency settings for an [`Emitter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterSettings {
    pub thread_pool_size: usize,
    pub emit_range: usize,
    pub byte_limit_post: usize,
    pub retry: RetryConfig,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self::from(&EmitterConfig::default())
    }
}

impl From<&EmitterConfig> for EmitterSettings {
    fn from(config: &EmitterConfig) -> Self {
        Self {
            thread_pool_size: config.thread_pool_size,
            emit_range: config.emit_range,
            byte_limit_post: config.byte_limit_post,
            retry: config.retry.clone(),
        }
    }
}

impl EmitterSettings {
    fn check(&self) -> Result<(), EmitterError> {
        if self.thread_pool_size == 0 {
            return Err(EmitterError::InvalidSetting {
                field: "thread_pool_size",
                message: "must be greater than 0".into(),
            });
        }
        if self.emit_range == 0 {
            return Err(EmitterError::InvalidSetting {
                field: "emit_range",
                message: "must be greater than 0".into(),
            });
        }
        if self.byte_limit_post <= envelope_overhead() {
            return Err(EmitterError::InvalidSetting {
                field: "byte_limit_post",
                message: format!("must exceed the {} byte envelope", envelope_overhead()),
            });
        }
        Ok(())
    }
}

/// Optional observers of an [`Emitter`]
#[derive(Clone, Default)]
pub struct EmitterHooks {
    /// Invoked once per completed batch with its terminal outcome
    pub callback: Option<RequestCallback>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

/// Snapshot of the emitter's cumulative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitterStats {
    /// Events accepted into the buffer
    pub events_enqueued: u64,
    /// Events that left the buffer inside a batch
    pub events_dispatched: u64,
    pub events_succeeded: u64,
    pub events_failed: u64,
    /// Events refused because the emitter was shut down
    pub events_dropped: u64,
    pub batches_dispatched: u64,
    pub batches_completed: u64,
    /// Events currently waiting in the buffer
    pub buffered: u64,
}

impl EmitterStats {
    /// Batches spawned but not yet completed.
    pub fn in_flight(&self) -> u64 {
        self.batches_dispatched.saturating_sub(self.batches_completed)
    }
}

#[derive(Default)]
struct Counters {
    events_enqueued: AtomicU64,
    events_dispatched: AtomicU64,
    events_succeeded: AtomicU64,
    events_failed: AtomicU64,
    events_dropped: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_completed: AtomicU64,
}

struct Inner {
    settings: EmitterSettings,
    sender: Arc<dyn IEventSender>,
    hooks: EmitterHooks,
    buffer: Mutex<EventBuffer>,
    /// Checked and set under the buffer lock
    closed: AtomicBool,
    semaphore: Arc<Semaphore>,
    tasks: TaskTracker,
    rt_handle: Handle,
    counters: Counters,
}

/// Buffers encoded events and delivers them in batches.
///
/// Cloning is cheap; clones share the same buffer, pool and counters.
#[derive(Clone)]
pub struct Emitter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Emitter {
    /// Creates an emitter on the current tokio runtime.
    ///
    /// # Errors
    /// [`EmitterError::NoRuntime`] when called outside a runtime, and
    /// [`EmitterError::InvalidSetting`] for zero or undersized limits.
    pub fn new(
        settings: EmitterSettings,
        sender: Arc<dyn IEventSender>,
        hooks: EmitterHooks,
    ) -> Result<Self, EmitterError> {
        let handle = Handle::try_current()?;
        Self::with_handle(settings, sender, hooks, handle)
    }

    /// Creates an emitter that spawns its deliveries on `rt_handle`.
    pub fn with_handle(
        settings: EmitterSettings,
        sender: Arc<dyn IEventSender>,
        hooks: EmitterHooks,
        rt_handle: Handle,
    ) -> Result<Self, EmitterError> {
        settings.check()?;
        debug!(
            thread_pool_size = settings.thread_pool_size,
            emit_range = settings.emit_range,
            byte_limit_post = settings.byte_limit_post,
            "Creating emitter"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(EventBuffer::new(
                    settings.emit_range,
                    settings.byte_limit_post,
                )),
                semaphore: Arc::new(Semaphore::new(settings.thread_pool_size)),
                settings,
                sender,
                hooks,
                closed: AtomicBool::new(false),
                tasks: TaskTracker::new(),
                rt_handle,
                counters: Counters::default(),
            }),
        })
    }

    pub fn settings(&self) -> &EmitterSettings {
        &self.inner.settings
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Adds an event to the buffer, dispatching any batch that became full.
    ///
    /// Returns `false` when the emitter has been shut down and the event was
    /// dropped.
    pub fn enqueue(&self, payload: EventPayload) -> bool {
        let inner = &self.inner;
        let mut buffer = inner.buffer.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.closed.load(Ordering::SeqCst) {
            drop(buffer);
            inner.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &inner.hooks.metrics {
                metrics.record_dropped("closed");
            }
            warn!("Emitter is shut down, dropping event");
            return false;
        }

        inner.counters.events_enqueued.fetch_add(1, Ordering::Relaxed);
        // Dispatch under the lock so batches are spawned in the order they
        // were cut, whichever thread cut them.
        for batch in buffer.push(payload) {
            self.dispatch(batch);
        }

        if let Some(metrics) = &inner.hooks.metrics {
            metrics.record_enqueued();
            metrics.set_buffered(buffer.len());
        }
        true
    }

    /// Cuts whatever is buffered and waits up to `timeout` for every
    /// in-flight batch to complete.
    ///
    /// Returns `true` when nothing was left in flight.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        {
            let mut buffer = inner.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(batch) = buffer.drain() {
                self.dispatch(batch);
            }
            if let Some(metrics) = &inner.hooks.metrics {
                metrics.set_buffered(0);
            }
        }

        inner.tasks.close();
        let drained = tokio::time::timeout(timeout, inner.tasks.wait())
            .await
            .is_ok();
        if !self.is_closed() {
            inner.tasks.reopen();
        }

        if drained {
            debug!("Emitter flushed");
        } else {
            warn!(
                in_flight = inner.tasks.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Flush timed out with batches still in flight"
            );
        }
        drained
    }

    /// Stops accepting events, then flushes.
    ///
    /// Events enqueued afterwards are dropped and counted in
    /// [`EmitterStats::events_dropped`].
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        {
            let _buffer = self.inner.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                debug!("Emitter already shut down");
            }
        }
        info!("Shutting down emitter");
        let drained = self.flush(timeout).await;
        let stats = self.stats();
        info!(
            succeeded = stats.events_succeeded,
            failed = stats.events_failed,
            dropped = stats.events_dropped,
            drained,
            "Emitter shut down"
        );
        drained
    }

    pub fn stats(&self) -> EmitterStats {
        let c = &self.inner.counters;
        let buffered = self
            .inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64;
        EmitterStats {
            events_enqueued: c.events_enqueued.load(Ordering::Relaxed),
            events_dispatched: c.events_dispatched.load(Ordering::Relaxed),
            events_succeeded: c.events_succeeded.load(Ordering::Relaxed),
            events_failed: c.events_failed.load(Ordering::Relaxed),
            events_dropped: c.events_dropped.load(Ordering::Relaxed),
            batches_dispatched: c.batches_dispatched.load(Ordering::Relaxed),
            batches_completed: c.batches_completed.load(Ordering::Relaxed),
            buffered,
        }
    }

    fn dispatch(&self, batch: Batch) {
        let inner = Arc::clone(&self.inner);
        inner.counters.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        inner
            .counters
            .events_dispatched
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        debug!(batch_id = %batch.id(), events = batch.len(), "Dispatching batch");

        self.inner
            .tasks
            .spawn_on(async move { inner.deliver(batch).await }, &self.inner.rt_handle);
    }
}

impl Inner {
    async fn deliver(&self, batch: Batch) {
        let started = Instant::now();
        let count = batch.len();

        let outcome = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(_permit) => {
                let attempt = deliver_with_retry(self.sender.as_ref(), &batch, &self.settings.retry);
                match AssertUnwindSafe(attempt).catch_unwind().await {
                    Ok(delivery) => reconcile(delivery.outcome, count),
                    Err(_) => {
                        error!(batch_id = %batch.id(), "Sender panicked while delivering batch");
                        DeliveryOutcome::rejected(count)
                    }
                }
            }
            Err(_) => {
                error!(batch_id = %batch.id(), "Worker pool closed");
                DeliveryOutcome::rejected(count)
            }
        };

        self.complete(&batch, outcome, started.elapsed());
    }

    fn complete(&self, batch: &Batch, outcome: DeliveryOutcome, elapsed: Duration) {
        let c = &self.counters;
        c.events_succeeded
            .fetch_add(outcome.success_count as u64, Ordering::Relaxed);
        c.events_failed
            .fetch_add(outcome.failure_count as u64, Ordering::Relaxed);
        c.batches_completed.fetch_add(1, Ordering::Relaxed);

        let result = if outcome.failure_count == 0 {
            "success"
        } else if outcome.success_count > 0 {
            "partial"
        } else {
            "failure"
        };
        if result == "failure" {
            warn!(
                batch_id = %batch.id(),
                events = outcome.failure_count,
                "Batch could not be delivered"
            );
        }
        if let Some(metrics) = &self.hooks.metrics {
            metrics.record_batch(
                result,
                outcome.success_count,
                outcome.failure_count,
                elapsed.as_secs_f64(),
            );
        }

        if let Some(callback) = &self.hooks.callback {
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(&outcome))).is_err() {
                error!(batch_id = %batch.id(), "Request callback panicked");
            }
        }
    }
}

/// Forces the outcome counts to add up to the batch size.
fn reconcile(outcome: DeliveryOutcome, batch_len: usize) -> DeliveryOutcome {
    if outcome.total() == batch_len {
        return outcome;
    }
    warn!(
        reported_success = outcome.success_count,
        reported_failure = outcome.failure_count,
        batch_len,
        "Sender outcome does not match batch size"
    );
    let success = outcome.success_count.min(batch_len);
    DeliveryOutcome::partial(success, batch_len - success, outcome.retryable)
}
