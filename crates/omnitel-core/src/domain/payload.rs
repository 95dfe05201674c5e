//! Wire payload
//!
//! The collector speaks the tracker protocol: each event is a flat map of
//! short string keys to string values, and a POST body wraps a list of such
//! maps in a `payload_data` envelope.
//!
//! | key     | meaning                                  |
//! |---------|------------------------------------------|
//! | `e`     | event type, always `se` (structured)     |
//! | `eid`   | event id                                 |
//! | `dtm`   | device created timestamp, ms since epoch |
//! | `stm`   | sent timestamp, added by the sender      |
//! | `tna`   | tracker namespace                        |
//! | `aid`   | application id                           |
//! | `p`     | platform                                 |
//! | `tv`    | tracker version                          |
//! | `se_ca` | category                                 |
//! | `se_ac` | action                                   |
//! | `se_la` | label                                    |
//! | `se_va` | value                                    |
//! | `se_pr` | properties, JSON-encoded                 |
//! | `co`    | contexts envelope, JSON-encoded          |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::context::{contexts_envelope, schemas, ContextFragment};
use super::event::Event;

/// Encoded form of one decorated event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(BTreeMap<String, String>);

impl EventPayload {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Copy of this payload stamped with the sent timestamp (`stm`)
    pub fn with_sent_timestamp(&self, sent_at_ms: i64) -> Self {
        let mut stamped = self.clone();
        stamped.insert("stm", sent_at_ms.to_string());
        stamped
    }

    /// Size of the JSON encoding of this payload in bytes
    pub fn byte_size(&self) -> usize {
        serde_json::to_string(&self.0)
            .map(|s| s.len())
            .unwrap_or_default()
    }

    /// Size this payload will have on the wire once the sender adds `stm`.
    pub fn stamped_byte_size(&self) -> usize {
        if self.0.contains_key("stm") {
            self.byte_size()
        } else {
            self.byte_size() + SENT_TIMESTAMP_BYTES
        }
    }
}

/// Bytes a `,"stm":"<millis>"` member adds to an encoded payload.
///
/// Millisecond timestamps keep 13 digits until the year 2286.
pub const SENT_TIMESTAMP_BYTES: usize = ",\"stm\":\"\"".len() + 13;

/// Builds the POST body for a list of payloads.
pub fn payload_data_envelope(events: &[EventPayload]) -> Value {
    json!({
        "schema": schemas::PAYLOAD_DATA,
        "data": events,
    })
}

/// Bytes the `payload_data` envelope adds around its events, not counting
/// the commas between them.
pub fn envelope_overhead() -> usize {
    serde_json::to_string(&payload_data_envelope(&[]))
        .map(|s| s.len())
        .unwrap_or_default()
}

/// An event after session, consent and context decoration
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub event: Event,
    pub namespace: String,
    pub app_id: String,
    pub platform: String,
    pub tracker_version: String,
    pub contexts: Vec<ContextFragment>,
}

impl TrackedEvent {
    /// Encodes the decorated event in the tracker protocol.
    pub fn to_payload(&self) -> EventPayload {
        let event = &self.event;
        let mut payload = EventPayload::new();

        payload.insert("e", "se");
        payload.insert("eid", event.id().to_string());
        payload.insert("dtm", event.created_at().timestamp_millis().to_string());
        payload.insert("tv", self.tracker_version.clone());
        payload.insert("tna", self.namespace.clone());
        payload.insert("aid", self.app_id.clone());
        payload.insert("p", self.platform.clone());

        payload.insert("se_ca", event.category());
        payload.insert("se_ac", event.action());
        if let Some(label) = event.label() {
            payload.insert("se_la", label);
        }
        if let Some(value) = event.value() {
            payload.insert("se_va", value.to_string());
        }
        if !event.properties().is_empty() {
            payload.insert("se_pr", Value::from_iter(event.properties().clone()).to_string());
        }

        if !self.contexts.is_empty() {
            payload.insert("co", contexts_envelope(&self.contexts).to_string());
        }

        payload
    }
}
