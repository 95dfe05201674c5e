//! Port definitions (collaborator interfaces)
//!
//! The pipeline depends on these traits; the host application (or the
//! adapter crates) supplies the implementations.
//!
//! ## Ports Overview
//!
//! - [`IEventSender`] - Transmits a batch to the collector
//! - [`IConsentProvider`] - Whether the user granted consent
//! - [`ILifecycleProvider`] - Whether the host is in the foreground
//! - [`IDiagnosticSink`] - Receives non-fatal pipeline failures

pub mod diagnostics;
pub mod host;
pub mod sender;

pub use diagnostics::IDiagnosticSink;
pub use host::{IConsentProvider, ILifecycleProvider};
pub use sender::{IEventSender, RequestCallback};
