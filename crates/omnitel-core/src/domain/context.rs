//! Self-describing context fragments
//!
//! A [`ContextFragment`] is a schema URI plus a JSON object. Fragments are
//! attached to an event at enrichment time and travel in the `co` field of
//! the payload, wrapped in a `contexts` envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::errors::DomainError;

/// Schema URIs used by the pipeline
pub mod schemas {
    /// Envelope wrapping every POST body
    pub const PAYLOAD_DATA: &str =
        "iglu:com.snowplowanalytics.snowplow/payload_data/jsonschema/1-0-4";
    /// Envelope wrapping the contexts attached to one event
    pub const CONTEXTS: &str = "iglu:com.snowplowanalytics.snowplow/contexts/jsonschema/1-0-1";
    /// Session context
    pub const CLIENT_SESSION: &str =
        "iglu:com.snowplowanalytics.snowplow/client_session/jsonschema/1-0-2";
    /// Consent / GDPR basis context
    pub const GDPR: &str = "iglu:com.snowplowanalytics.snowplow/gdpr/jsonschema/1-0-0";
    /// Application version / build context
    pub const APPLICATION: &str = "iglu:com.snowplowanalytics.mobile/application/jsonschema/1-0-0";
    /// Platform (operating system / device) context
    pub const PLATFORM: &str = "iglu:com.snowplowanalytics.snowplow/mobile_context/jsonschema/1-0-3";
}

/// A schema-tagged JSON object attached to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFragment {
    schema: String,
    data: Map<String, Value>,
}

impl ContextFragment {
    /// Creates a fragment after checking the schema URI.
    pub fn new(schema: impl Into<String>, data: Map<String, Value>) -> Result<Self, DomainError> {
        let schema = schema.into();
        validate_schema(&schema)?;
        Ok(Self { schema, data })
    }

    /// Creates a fragment from an arbitrary JSON value, which must be an object.
    pub fn from_value(schema: impl Into<String>, data: Value) -> Result<Self, DomainError> {
        let schema = schema.into();
        match data {
            Value::Object(map) => Self::new(schema, map),
            _ => Err(DomainError::NotAnObject(schema)),
        }
    }

    /// Creates a fragment for one of the [`schemas`] constants without
    /// re-validating the URI.
    pub fn builtin(schema: &'static str, data: Map<String, Value>) -> Self {
        Self {
            schema: schema.to_string(),
            data,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The `{"schema": ..., "data": ...}` JSON form
    pub fn to_json(&self) -> Value {
        json!({
            "schema": self.schema,
            "data": self.data,
        })
    }
}

/// Wraps fragments in the `contexts` envelope carried by the `co` field.
pub fn contexts_envelope(fragments: &[ContextFragment]) -> Value {
    json!({
        "schema": schemas::CONTEXTS,
        "data": fragments.iter().map(ContextFragment::to_json).collect::<Vec<_>>(),
    })
}

/// Checks that a schema URI has the `iglu:vendor/name/format/version` shape.
pub fn validate_schema(schema: &str) -> Result<(), DomainError> {
    let Some(path) = schema.strip_prefix("iglu:") else {
        return Err(DomainError::InvalidSchema(schema.to_string()));
    };
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
        return Err(DomainError::InvalidSchema(schema.to_string()));
    }
    let version: Vec<&str> = parts[3].split('-').collect();
    if version.len() != 3 || version.iter().any(|n| n.parse::<u32>().is_err()) {
        return Err(DomainError::InvalidSchema(schema.to_string()));
    }
    Ok(())
}
