//! Consent basis and policy document
//!
//! A [`ConsentRecord`] is configured once at startup and never changes.
//! It decides whether events may leave the device and supplies the `gdpr`
//! context fragment used to tag permitted events for audit.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use super::context::{schemas, ContextFragment};

/// Legal basis under which telemetry is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Consent,
    Contract,
    LegalObligation,
    VitalInterests,
    PublicTask,
    LegitimateInterests,
}

impl Basis {
    /// Returns true if events may only be sent after the user explicitly agreed
    pub fn requires_consent(&self) -> bool {
        matches!(self, Basis::Consent)
    }

    /// Wire name used in the `basisForProcessing` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::Consent => "consent",
            Basis::Contract => "contract",
            Basis::LegalObligation => "legal_obligation",
            Basis::VitalInterests => "vital_interests",
            Basis::PublicTask => "public_task",
            Basis::LegitimateInterests => "legitimate_interests",
        }
    }
}

impl Default for Basis {
    fn default() -> Self {
        Basis::Consent
    }
}

impl std::fmt::Display for Basis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The consent basis together with the policy document it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub basis: Basis,
    pub document_id: Option<String>,
    pub document_version: Option<String>,
    pub description: Option<String>,
}

impl ConsentRecord {
    pub fn new(
        basis: Basis,
        document_id: impl Into<String>,
        document_version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            basis,
            document_id: Some(document_id.into()),
            document_version: Some(document_version.into()),
            description: Some(description.into()),
        }
    }

    /// The `gdpr` fragment attached to permitted events
    pub fn to_fragment(&self) -> ContextFragment {
        let mut data = Map::new();
        data.insert("basisForProcessing".into(), json!(self.basis.as_str()));
        data.insert("documentId".into(), json!(self.document_id));
        data.insert("documentVersion".into(), json!(self.document_version));
        data.insert("documentDescription".into(), json!(self.description));
        ContextFragment::builtin(schemas::GDPR, data)
    }
}
