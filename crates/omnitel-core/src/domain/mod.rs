//! Domain entities and value types
//!
//! This module contains the core domain types for the pipeline:
//! - Newtypes for event, session, batch and user identifiers
//! - Structured events and their context fragments
//! - Consent records and session snapshots
//! - Batches, delivery outcomes and the wire payload
//! - Domain-specific error types

pub mod batch;
pub mod consent;
pub mod context;
pub mod errors;
pub mod event;
pub mod newtypes;
pub mod payload;
pub mod session;

// Re-export commonly used types
pub use batch::{Batch, DeliveryOutcome};
pub use consent::{Basis, ConsentRecord};
pub use context::{schemas, ContextFragment};
pub use errors::{DomainError, EnrichmentError};
pub use event::Event;
pub use newtypes::*;
pub use payload::{EventPayload, TrackedEvent};
pub use session::SessionContext;
