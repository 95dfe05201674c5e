//! Global context rule sets
//!
//! The [`ContextRegistry`] maps a rule-set tag to an ordered list of
//! [`ContextGenerator`]s. Enrichment walks the rule sets in registration
//! order and concatenates whatever fragments each generator yields.
//!
//! A generator that errors or panics contributes nothing for that event.
//! The failure goes to the [`IDiagnosticSink`] and enrichment continues with
//! the next generator; it never reaches the caller of `track`.
//!
//! Rule sets the tracker builds from configuration are marked built-in.
//! Their generators only copy precomputed fragments, so they are the only
//! ones run for events tracked from inside the panic hook.

use std::cell::Cell;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use omnitel_core::config::{ApplicationConfig, GlobalContextConfig};
use omnitel_core::domain::{schemas, ContextFragment, EnrichmentError, Event};
use omnitel_core::ports::IDiagnosticSink;
use serde_json::{json, Map};
use tracing::warn;

use crate::error::TrackerError;

/// Produces context fragments for an event
pub trait ContextGenerator: Send + Sync {
    fn generate(&self, event: &Event) -> Result<Vec<ContextFragment>, EnrichmentError>;

    /// Whether this generator should run for `event` at all.
    fn applies_to(&self, _event: &Event) -> bool {
        true
    }
}

impl<F> ContextGenerator for F
where
    F: Fn(&Event) -> Result<Vec<ContextFragment>, EnrichmentError> + Send + Sync,
{
    fn generate(&self, event: &Event) -> Result<Vec<ContextFragment>, EnrichmentError> {
        self(event)
    }
}

/// A fixed list of fragments attached to every event
#[derive(Debug, Clone)]
pub struct StaticContext {
    fragments: Vec<ContextFragment>,
}

impl StaticContext {
    pub fn new(fragments: Vec<ContextFragment>) -> Self {
        Self { fragments }
    }

    /// Builds the fragments of a configured rule set, checking each schema.
    pub fn from_config(config: &GlobalContextConfig) -> Result<Self, TrackerError> {
        let fragments = config
            .contexts
            .iter()
            .map(|f| f.to_fragment())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| TrackerError::InvalidContext {
                tag: config.tag.clone(),
                source,
            })?;
        Ok(Self::new(fragments))
    }

    /// The application version/build context.
    pub fn application(config: &ApplicationConfig) -> Self {
        let mut data = Map::new();
        data.insert("version".into(), json!(config.version));
        data.insert("build".into(), json!(config.build));
        Self::new(vec![ContextFragment::builtin(schemas::APPLICATION, data)])
    }
}

impl ContextGenerator for StaticContext {
    fn generate(&self, _event: &Event) -> Result<Vec<ContextFragment>, EnrichmentError> {
        Ok(self.fragments.clone())
    }
}

/// Restricts a generator to the events a predicate accepts
pub struct Filtered<P> {
    inner: Arc<dyn ContextGenerator>,
    predicate: P,
}

impl<P> Filtered<P>
where
    P: Fn(&Event) -> bool + Send + Sync,
{
    pub fn new(inner: Arc<dyn ContextGenerator>, predicate: P) -> Self {
        Self { inner, predicate }
    }
}

impl<P> ContextGenerator for Filtered<P>
where
    P: Fn(&Event) -> bool + Send + Sync,
{
    fn generate(&self, event: &Event) -> Result<Vec<ContextFragment>, EnrichmentError> {
        self.inner.generate(event)
    }

    fn applies_to(&self, event: &Event) -> bool {
        (self.predicate)(event) && self.inner.applies_to(event)
    }
}

/// Diagnostics sink that logs enrichment failures
#[derive(Debug, Default)]
pub struct TracingDiagnosticSink;

impl IDiagnosticSink for TracingDiagnosticSink {
    fn enrichment_failed(&self, rule_set: &str, error: &EnrichmentError) {
        warn!(rule_set, error = %error, "Context generator failed, skipping");
    }
}

thread_local! {
    static ENRICHING: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is running a context generator.
pub(crate) fn is_enriching() -> bool {
    ENRICHING.with(Cell::get)
}

/// Marks the current thread as enriching until dropped, unwinding included.
struct EnrichingGuard {
    previous: bool,
}

impl EnrichingGuard {
    fn enter() -> Self {
        Self {
            previous: ENRICHING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for EnrichingGuard {
    fn drop(&mut self) {
        ENRICHING.with(|flag| flag.set(self.previous));
    }
}

struct RuleSet {
    tag: String,
    generators: Vec<Arc<dyn ContextGenerator>>,
    builtin: bool,
}

/// Ordered registry of context rule sets
pub struct ContextRegistry {
    rule_sets: Vec<RuleSet>,
    diagnostics: Arc<dyn IDiagnosticSink>,
}

impl ContextRegistry {
    pub fn new(diagnostics: Arc<dyn IDiagnosticSink>) -> Self {
        Self {
            rule_sets: Vec::new(),
            diagnostics,
        }
    }

    /// Adds a rule set after the existing ones.
    ///
    /// # Errors
    /// [`TrackerError::DuplicateRuleSet`] if `tag` is already registered.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        generators: Vec<Arc<dyn ContextGenerator>>,
    ) -> Result<(), TrackerError> {
        self.insert(tag.into(), generators, false)
    }

    /// Adds a rule set whose generators cannot fail or panic.
    pub(crate) fn register_builtin(
        &mut self,
        tag: impl Into<String>,
        generators: Vec<Arc<dyn ContextGenerator>>,
    ) -> Result<(), TrackerError> {
        self.insert(tag.into(), generators, true)
    }

    fn insert(
        &mut self,
        tag: String,
        generators: Vec<Arc<dyn ContextGenerator>>,
        builtin: bool,
    ) -> Result<(), TrackerError> {
        if self.rule_sets.iter().any(|r| r.tag == tag) {
            return Err(TrackerError::DuplicateRuleSet(tag));
        }
        self.rule_sets.push(RuleSet {
            tag,
            generators,
            builtin,
        });
        Ok(())
    }

    /// Registered tags in enrichment order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.rule_sets.iter().map(|r| r.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    /// Runs every applicable generator and collects their fragments.
    pub fn enrich(&self, event: &Event) -> Vec<ContextFragment> {
        self.enrich_rule_sets(event, false)
    }

    /// Like [`enrich`](Self::enrich), restricted to built-in rule sets.
    pub(crate) fn enrich_builtin(&self, event: &Event) -> Vec<ContextFragment> {
        self.enrich_rule_sets(event, true)
    }

    fn enrich_rule_sets(&self, event: &Event, builtin_only: bool) -> Vec<ContextFragment> {
        let mut fragments = Vec::new();

        for rule_set in &self.rule_sets {
            if builtin_only && !rule_set.builtin {
                continue;
            }
            for generator in &rule_set.generators {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    let _enriching = EnrichingGuard::enter();
                    if generator.applies_to(event) {
                        generator.generate(event)
                    } else {
                        Ok(Vec::new())
                    }
                }));

                match outcome {
                    Ok(Ok(generated)) => fragments.extend(generated),
                    Ok(Err(e)) => self.diagnostics.enrichment_failed(&rule_set.tag, &e),
                    Err(payload) => {
                        let error = EnrichmentError::Panicked(panic_text(payload.as_ref()));
                        self.diagnostics.enrichment_failed(&rule_set.tag, &error);
                    }
                }
            }
        }

        fragments
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
