//! Diagnostics sink port
//!
//! Receives failures that the pipeline absorbs instead of propagating.

use crate::domain::EnrichmentError;

/// Destination for non-fatal pipeline errors
pub trait IDiagnosticSink: Send + Sync {
    /// A context generator failed; its fragments were skipped.
    fn enrichment_failed(&self, rule_set: &str, error: &EnrichmentError);
}
