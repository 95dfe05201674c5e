//! Session snapshot
//!
//! [`SessionContext`] is the read-only view of the current session that the
//! session tracker hands out on every `track` call. It is serialized into the
//! `client_session` context fragment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use super::context::{schemas, ContextFragment};
use super::newtypes::{EventId, SessionId, UserId};

/// Snapshot of the session an event belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Install-scoped user identifier
    pub user_id: UserId,
    /// Current session identifier
    pub session_id: SessionId,
    /// 1-based counter, incremented at every session boundary
    pub session_index: u64,
    /// Identifier of the session that preceded this one
    pub previous_session_id: Option<SessionId>,
    /// First event of the session
    pub first_event_id: EventId,
    /// Device time of the first event of the session
    pub first_event_timestamp: DateTime<Utc>,
    /// Whether this call opened a new session
    #[serde(skip)]
    pub is_new: bool,
}

impl SessionContext {
    /// The `client_session` fragment attached to events
    pub fn to_fragment(&self) -> ContextFragment {
        let mut data = Map::new();
        data.insert("userId".into(), json!(self.user_id.to_string()));
        data.insert("sessionId".into(), json!(self.session_id.to_string()));
        data.insert("sessionIndex".into(), json!(self.session_index));
        data.insert(
            "previousSessionId".into(),
            json!(self.previous_session_id.map(|id| id.to_string())),
        );
        data.insert("firstEventId".into(), json!(self.first_event_id.to_string()));
        data.insert(
            "firstEventTimestamp".into(),
            json!(self.first_event_timestamp.to_rfc3339()),
        );
        ContextFragment::builtin(schemas::CLIENT_SESSION, data)
    }
}
