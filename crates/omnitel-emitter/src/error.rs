//! Emitter construction errors

use thiserror::Error;

/// Errors raised while building an emitter or sender.
///
/// Delivery problems never surface here; they are reported through
/// [`DeliveryOutcome`](omnitel_core::domain::DeliveryOutcome).
#[derive(Debug, Error)]
pub enum EmitterError {
    /// No tokio runtime was running on the constructing thread
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The collector endpoint could not be parsed
    #[error("invalid collector endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A batching limit was zero or too small to hold any event
    #[error("invalid emitter setting {field}: {message}")]
    InvalidSetting {
        field: &'static str,
        message: String,
    },
}
