//! Omnitel Core - Domain types, configuration and ports
//!
//! This crate contains the pieces of the telemetry pipeline that carry no
//! runtime machinery:
//! - **Domain types** - `Event`, `ContextFragment`, `SessionContext`, `ConsentRecord`,
//!   `Batch`, `DeliveryOutcome`, and the `EventPayload` wire form
//! - **Configuration** - YAML-backed `Config` with eager validation
//! - **Port definitions** - Traits for collaborators: `IEventSender`,
//!   `IConsentProvider`, `ILifecycleProvider`, `IDiagnosticSink`
//!
//! # Architecture
//!
//! Adapter crates depend on this one. `omnitel-emitter` implements the
//! transport side of the ports, `omnitel-tracker` composes everything into
//! the `track(event)` entry point.

pub mod config;
pub mod domain;
pub mod ports;

/// Tracker version reported in the `tv` field of every payload.
pub const TRACKER_VERSION: &str = concat!("rust-omnitel-", env!("CARGO_PKG_VERSION"));
