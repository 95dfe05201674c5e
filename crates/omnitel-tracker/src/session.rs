//! Session windowing
//!
//! A session is the run of events whose gaps stay within the inactivity
//! timeout of the current foreground/background state. The first event ever
//! seen opens session 1; an event arriving after a longer gap opens the next
//! one. There is no terminal state.
//!
//! Time comes in as a monotonic [`Instant`] so wall-clock jumps never split
//! or merge sessions, and so tests can drive the clock.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use omnitel_core::config::SessionConfig;
use omnitel_core::domain::{EventId, SessionContext, SessionId, UserId};
use tracing::debug;

struct SessionState {
    context: SessionContext,
    started_at: Instant,
    last_activity_at: Instant,
}

/// Assigns events to sessions
pub struct SessionTracker {
    foreground_timeout: Duration,
    background_timeout: Duration,
    user_id: UserId,
    state: Mutex<Option<SessionState>>,
}

impl SessionTracker {
    pub fn new(foreground_timeout: Duration, background_timeout: Duration) -> Self {
        Self {
            foreground_timeout,
            background_timeout,
            user_id: UserId::new(),
            state: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.foreground_timeout(), config.background_timeout())
    }

    /// Uses a known user id instead of a fresh one.
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Inactivity timeout for the given application state.
    pub fn timeout_for(&self, foreground: bool) -> Duration {
        if foreground {
            self.foreground_timeout
        } else {
            self.background_timeout
        }
    }

    /// Records activity at `now` and returns the session it belongs to.
    ///
    /// `event_id` and `event_timestamp` are remembered as the first event
    /// when this call opens a session. The gap must be strictly longer than
    /// the timeout to end the session.
    pub fn update(
        &self,
        event_id: EventId,
        event_timestamp: DateTime<Utc>,
        foreground: bool,
        now: Instant,
    ) -> SessionContext {
        let timeout = self.timeout_for(foreground);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = state.as_mut() {
            let idle = now.saturating_duration_since(current.last_activity_at);
            if idle <= timeout {
                current.last_activity_at = current.last_activity_at.max(now);
                let mut context = current.context.clone();
                context.is_new = false;
                return context;
            }
            debug!(
                session_id = %current.context.session_id,
                idle_ms = idle.as_millis() as u64,
                session_ms = now.saturating_duration_since(current.started_at).as_millis() as u64,
                foreground,
                "Session timed out"
            );
        }

        let previous = state.as_ref().map(|s| &s.context);
        let context = SessionContext {
            user_id: self.user_id,
            session_id: SessionId::new(),
            session_index: previous.map_or(1, |c| c.session_index + 1),
            previous_session_id: previous.map(|c| c.session_id),
            first_event_id: event_id,
            first_event_timestamp: event_timestamp,
            is_new: true,
        };
        debug!(
            session_id = %context.session_id,
            session_index = context.session_index,
            "Started new session"
        );

        *state = Some(SessionState {
            context: context.clone(),
            started_at: now,
            last_activity_at: now,
        });
        context
    }

    /// Current session without recording activity.
    pub fn current(&self) -> Option<SessionContext> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| {
                let mut context = s.context.clone();
                context.is_new = false;
                context
            })
    }
}
