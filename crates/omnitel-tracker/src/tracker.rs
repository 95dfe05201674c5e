//! Tracker orchestrator
//!
//! ```text
//!   track(event)
//!     ├─ validate            invalid  → drop (warn, metric "invalid")
//!     ├─ ConsentGate         denied   → drop (debug, metric "consent")
//!     ├─ SessionTracker      current session, window updated
//!     ├─ decorate            client_session + gdpr + registry fragments
//!     ├─ encode              TrackedEvent → EventPayload
//!     └─ Emitter::enqueue    returns immediately
//! ```
//!
//! Telemetry is best effort. `track` returns nothing and never fails;
//! dropped and undelivered events show up only in logs, metrics and
//! [`EmitterStats`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use omnitel_core::config::{Config, ConfigError, TrackerConfig};
use omnitel_core::domain::{Event, SessionContext, TrackedEvent};
use omnitel_core::ports::{IConsentProvider, IDiagnosticSink, IEventSender, ILifecycleProvider};
use omnitel_core::TRACKER_VERSION;
use omnitel_emitter::{
    Emitter, EmitterHooks, EmitterSettings, EmitterStats, HttpEventSender, MetricsRegistry,
};
use tracing::{debug, info, warn};

use crate::consent::ConsentGate;
use crate::context::{ContextGenerator, ContextRegistry, StaticContext, TracingDiagnosticSink};
use crate::error::TrackerError;
use crate::host::{ConsentFlag, ForegroundState};
use crate::platform::PlatformContext;
use crate::session::SessionTracker;

/// Rule-set tag of the built-in application context
pub const APPLICATION_RULE_SET: &str = "omnitel.application";

/// Rule-set tag of the built-in platform context
pub const PLATFORM_RULE_SET: &str = "omnitel.platform";

/// Which context rule sets decorate an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enrichment {
    All,
    BuiltinOnly,
}

/// Host-provided collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub consent: Arc<dyn IConsentProvider>,
    pub lifecycle: Arc<dyn ILifecycleProvider>,
    pub diagnostics: Arc<dyn IDiagnosticSink>,
}

impl Default for Collaborators {
    /// Consent not granted, application in the foreground, failures logged.
    fn default() -> Self {
        Self {
            consent: Arc::new(ConsentFlag::default()),
            lifecycle: Arc::new(ForegroundState::default()),
            diagnostics: Arc::new(TracingDiagnosticSink),
        }
    }
}

/// Entry point of the telemetry pipeline.
///
/// Built once at startup from a validated [`Config`] and the host's
/// collaborators; share it behind an `Arc`.
pub struct Tracker {
    settings: TrackerConfig,
    flush_timeout: Duration,
    session: SessionTracker,
    consent: ConsentGate,
    contexts: ContextRegistry,
    emitter: Emitter,
    lifecycle: Arc<dyn ILifecycleProvider>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Tracker {
    /// Builds a tracker that delivers to the configured collector over HTTP.
    pub fn from_config(
        config: &Config,
        collaborators: Collaborators,
        hooks: EmitterHooks,
    ) -> Result<Self, TrackerError> {
        let sender = HttpEventSender::new(&config.network)?;
        Self::with_sender(config, Arc::new(sender), collaborators, hooks)
    }

    /// Builds a tracker around any [`IEventSender`].
    ///
    /// Must be called inside a tokio runtime; deliveries are spawned on it.
    pub fn with_sender(
        config: &Config,
        sender: Arc<dyn IEventSender>,
        collaborators: Collaborators,
        hooks: EmitterHooks,
    ) -> Result<Self, TrackerError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors).into());
        }

        let metrics = hooks.metrics.clone();
        let emitter = Emitter::new(EmitterSettings::from(&config.emitter), sender, hooks)?;

        let mut contexts = ContextRegistry::new(collaborators.diagnostics);
        if config.tracker.application_context {
            let generator: Arc<dyn ContextGenerator> =
                Arc::new(StaticContext::application(&config.application));
            contexts.register_builtin(APPLICATION_RULE_SET, vec![generator])?;
        }
        if config.tracker.platform_context {
            let generator: Arc<dyn ContextGenerator> = Arc::new(PlatformContext::collect());
            contexts.register_builtin(PLATFORM_RULE_SET, vec![generator])?;
        }
        for rule_set in &config.global_contexts {
            let generator: Arc<dyn ContextGenerator> =
                Arc::new(StaticContext::from_config(rule_set)?);
            contexts.register_builtin(rule_set.tag.clone(), vec![generator])?;
        }

        let consent = ConsentGate::new(
            config.gdpr.as_ref().map(|g| g.to_record()),
            collaborators.consent,
        );

        info!(
            namespace = %config.tracker.namespace,
            app_id = %config.tracker.app_id,
            method = ?config.network.method,
            rule_sets = contexts.len(),
            gdpr_basis = ?consent.record().map(|r| r.basis),
            "Tracker initialized"
        );

        Ok(Self {
            settings: config.tracker.clone(),
            flush_timeout: config.emitter.flush_timeout(),
            session: SessionTracker::from_config(&config.session),
            consent,
            contexts,
            emitter,
            lifecycle: collaborators.lifecycle,
            metrics,
        })
    }

    /// Adds a host-defined context rule set after the configured ones.
    pub fn register_context(
        &mut self,
        tag: impl Into<String>,
        generators: Vec<Arc<dyn ContextGenerator>>,
    ) -> Result<(), TrackerError> {
        self.contexts.register(tag, generators)
    }

    pub fn settings(&self) -> &TrackerConfig {
        &self.settings
    }

    /// Default timeout for [`flush`](Self::flush) and
    /// [`shutdown`](Self::shutdown).
    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Records an event. Never blocks on I/O and never fails.
    pub fn track(&self, event: Event) {
        self.track_with(event, Enrichment::All);
    }

    /// Tracks from inside the panic hook, where a second panic would abort
    /// the process: host-registered generators are not run.
    pub(crate) fn track_from_panic_hook(&self, event: Event) {
        self.track_with(event, Enrichment::BuiltinOnly);
    }

    fn track_with(&self, event: Event, enrichment: Enrichment) {
        if let Err(e) = event.validate() {
            warn!(error = %e, "Dropping invalid event");
            self.record_dropped("invalid");
            return;
        }

        if !self.consent.permits(&event) {
            debug!(
                category = event.category(),
                action = event.action(),
                "Consent not granted, dropping event"
            );
            self.record_dropped("consent");
            return;
        }

        let foreground = self.lifecycle.is_foreground();
        let session = self
            .session
            .update(event.id(), event.created_at(), foreground, Instant::now());

        let mut contexts = Vec::new();
        if self.settings.session_context {
            contexts.push(session.to_fragment());
        }
        if let Some(fragment) = self.consent.fragment() {
            contexts.push(fragment.clone());
        }
        contexts.extend(match enrichment {
            Enrichment::All => self.contexts.enrich(&event),
            Enrichment::BuiltinOnly => self.contexts.enrich_builtin(&event),
        });

        debug!(
            event_id = %event.id(),
            category = event.category(),
            action = event.action(),
            session_id = %session.session_id,
            contexts = contexts.len(),
            "Tracking event"
        );

        let tracked = TrackedEvent {
            event,
            namespace: self.settings.namespace.clone(),
            app_id: self.settings.app_id.clone(),
            platform: self.settings.platform.clone(),
            tracker_version: TRACKER_VERSION.to_string(),
            contexts,
        };
        self.emitter.enqueue(tracked.to_payload());
    }

    /// Tracks a foreground/background transition when lifecycle
    /// autotracking is on.
    ///
    /// The host updates its [`ILifecycleProvider`] first, then calls this.
    pub fn lifecycle_changed(&self, foreground: bool) {
        if !self.settings.lifecycle_autotracking {
            return;
        }
        let action = if foreground { "foreground" } else { "background" };
        self.track(Event::new("application_lifecycle", action));
    }

    /// Current session, without recording activity.
    pub fn session_context(&self) -> Option<SessionContext> {
        self.session.current()
    }

    pub fn stats(&self) -> EmitterStats {
        self.emitter.stats()
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Sends everything buffered and waits for in-flight batches.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.emitter.flush(timeout).await
    }

    /// Flushes, then refuses further events.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.emitter.shutdown(timeout).await
    }

    fn record_dropped(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dropped(reason);
        }
    }
}
