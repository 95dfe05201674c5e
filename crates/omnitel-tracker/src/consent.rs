//! Consent gating
//!
//! The gate holds the processing basis declared at startup. Under the
//! `consent` basis an event passes only while the host reports that the user
//! granted consent; every other basis lets events through. Events that pass
//! are tagged with the `gdpr` context describing the basis and the policy
//! document.

use std::sync::Arc;

use omnitel_core::domain::{ConsentRecord, ContextFragment, Event};
use omnitel_core::ports::IConsentProvider;

/// Decides which events may be tracked
pub struct ConsentGate {
    record: Option<ConsentRecord>,
    fragment: Option<ContextFragment>,
    provider: Arc<dyn IConsentProvider>,
}

impl ConsentGate {
    /// `record` is `None` when no basis is declared: nothing is gated or
    /// tagged.
    pub fn new(record: Option<ConsentRecord>, provider: Arc<dyn IConsentProvider>) -> Self {
        let fragment = record.as_ref().map(ConsentRecord::to_fragment);
        Self {
            record,
            fragment,
            provider,
        }
    }

    pub fn record(&self) -> Option<&ConsentRecord> {
        self.record.as_ref()
    }

    pub fn permits(&self, _event: &Event) -> bool {
        match &self.record {
            Some(record) if record.basis.requires_consent() => self.provider.has_consent(),
            _ => true,
        }
    }

    /// The `gdpr` fragment attached to permitted events.
    pub fn fragment(&self) -> Option<&ContextFragment> {
        self.fragment.as_ref()
    }
}
