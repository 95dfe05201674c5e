//! Tracker construction errors

use omnitel_core::config::ConfigError;
use omnitel_core::domain::DomainError;
use omnitel_emitter::EmitterError;
use thiserror::Error;

/// Errors raised while assembling a [`Tracker`](crate::Tracker).
///
/// Tracking itself never fails; these only occur at startup.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Emitter(#[from] EmitterError),

    #[error("invalid context in rule set '{tag}': {source}")]
    InvalidContext {
        tag: String,
        #[source]
        source: DomainError,
    },

    #[error("context rule set '{0}' is already registered")]
    DuplicateRuleSet(String),
}
