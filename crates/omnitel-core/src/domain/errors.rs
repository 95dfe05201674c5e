//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! validation of events and fragments, identifier parsing, and failures
//! raised by context generators.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required event field is empty
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// Schema URI does not follow `iglu:vendor/name/format/version`
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Context data is not a JSON object
    #[error("Context data for {0} must be a JSON object")]
    NotAnObject(String),

    /// Numeric value is NaN or infinite
    #[error("Value is not finite: {0}")]
    NonFiniteValue(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Error raised by a context generator while decorating an event.
///
/// Enrichment failures never abort the pipeline; the registry reports them
/// to the diagnostics sink and moves on to the next generator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    /// The generator could not collect the data it needs
    #[error("context unavailable: {0}")]
    Unavailable(String),

    /// The generator produced a fragment that failed validation
    #[error("invalid fragment: {0}")]
    InvalidFragment(#[from] DomainError),

    /// The generator panicked
    #[error("generator panicked: {0}")]
    Panicked(String),
}
