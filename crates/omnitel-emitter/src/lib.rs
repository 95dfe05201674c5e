//! Omnitel Emitter - batched, concurrent delivery of tracked events
//!
//! The [`Emitter`](emitter::Emitter) buffers encoded events, cuts them into
//! batches bounded by count and POST body size, and hands each batch to an
//! [`IEventSender`](omnitel_core::ports::IEventSender) on a bounded pool of
//! tokio tasks. [`HttpEventSender`](sender::HttpEventSender) is the
//! collector transport.
//!
//! The crate also owns the pipeline's Prometheus registry and the small
//! hyper server that exposes it.

pub mod buffer;
pub mod emitter;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod sender;
pub mod server;

pub use emitter::{Emitter, EmitterHooks, EmitterSettings, EmitterStats};
pub use error::EmitterError;
pub use metrics::MetricsRegistry;
pub use sender::{HttpEventSender, DEFAULT_GET_CONCURRENCY};
pub use server::MetricsServer;
