//! Host application ports
//!
//! Both traits are read on every `track` call, so implementations should be
//! cheap (typically an atomic load).

/// Supplies the user's consent decision
pub trait IConsentProvider: Send + Sync {
    /// Returns true if the user explicitly granted telemetry consent
    fn has_consent(&self) -> bool;
}

/// Reports whether the host application is in the foreground
pub trait ILifecycleProvider: Send + Sync {
    fn is_foreground(&self) -> bool;
}
