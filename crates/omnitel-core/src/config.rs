//! Configuration module for Omnitel.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, defaults, and eager validation. A configuration is
//! loaded once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::domain::context::validate_schema;
use crate::domain::{Basis, ConsentRecord, ContextFragment, DomainError};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Omnitel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub tracker: TrackerConfig,
    pub emitter: EmitterConfig,
    pub session: SessionConfig,
    /// Consent policy. `None` means no basis is declared and events are
    /// neither gated nor tagged.
    pub gdpr: Option<GdprConfig>,
    pub application: ApplicationConfig,
    pub global_contexts: Vec<GlobalContextConfig>,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP method used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// One request per batch with a JSON body
    Post,
    /// One request per event with query parameters
    Get,
}

/// Scheme prepended to endpoints that do not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Collector endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Collector URL; a bare host gets the `protocol` scheme.
    pub endpoint: String,
    pub method: HttpMethod,
    pub protocol: Protocol,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Tracker identity and built-in context switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracker namespace (`tna`).
    pub namespace: String,
    /// Application id (`aid`).
    pub app_id: String,
    /// Platform code (`p`), e.g. `mob` or `pc`.
    pub platform: String,
    /// Attach the `client_session` context.
    pub session_context: bool,
    /// Attach the platform (operating system) context.
    pub platform_context: bool,
    /// Attach the application version/build context.
    pub application_context: bool,
    /// Track foreground/background transitions reported by the host.
    pub lifecycle_autotracking: bool,
    /// Track panics as `application_error` events.
    pub exception_autotracking: bool,
}

/// Batching, worker pool and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Number of batches that may be in flight at once.
    pub thread_pool_size: usize,
    /// Maximum number of events per batch.
    pub emit_range: usize,
    /// Maximum POST body size in bytes.
    pub byte_limit_post: usize,
    /// How long `flush`/`shutdown` wait for in-flight batches.
    pub flush_timeout_secs: u64,
    pub retry: RetryConfig,
}

/// Retry policy for failed batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per batch; 1 disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for the exponential backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

/// Session windowing timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity gap (seconds) that ends a session while in the foreground.
    pub foreground_timeout_secs: u64,
    /// Inactivity gap (seconds) that ends a session while in the background.
    pub background_timeout_secs: u64,
}

/// Consent basis and policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdprConfig {
    pub basis: Basis,
    pub document_id: Option<String>,
    pub document_version: Option<String>,
    pub document_description: Option<String>,
}

/// Values reported by the application context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub version: String,
    pub build: String,
}

/// A named rule set of static context fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalContextConfig {
    pub tag: String,
    pub contexts: Vec<FragmentConfig>,
}

/// One static context fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentConfig {
    pub schema: String,
    pub data: Map<String, Value>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// Prometheus endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address to bind, e.g. `127.0.0.1:9100`.
    pub endpoint: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/omnitel/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("omnitel")
            .join("config.yaml")
    }

    /// Validate and return the configuration, or every problem found.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9090".to_string(),
            method: HttpMethod::Post,
            protocol: Protocol::Https,
            request_timeout_secs: 30,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: "appTracker".to_string(),
            app_id: "salesAndroidApp".to_string(),
            platform: "mob".to_string(),
            session_context: true,
            platform_context: true,
            application_context: true,
            lifecycle_autotracking: true,
            exception_autotracking: true,
        }
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 20,
            emit_range: 500,
            byte_limit_post: 52_000,
            flush_timeout_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            foreground_timeout_secs: 30,
            background_timeout_secs: 30,
        }
    }
}

impl Default for GdprConfig {
    fn default() -> Self {
        Self {
            basis: Basis::Consent,
            document_id: Some("someId".to_string()),
            document_version: Some("0.1.0".to_string()),
            document_description: Some("this is a demo document description".to_string()),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            version: "0.3.0".to_string(),
            build: "3".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "127.0.0.1:9100".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl NetworkConfig {
    /// Parses the endpoint, prepending the configured scheme when missing.
    pub fn collector_url(&self) -> Result<Url, url::ParseError> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.contains("://") {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("{}://{}", self.protocol.scheme(), endpoint))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl EmitterConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

impl RetryConfig {
    /// Backoff before attempt number `attempt + 1` (1-based `attempt`).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

impl SessionConfig {
    pub fn foreground_timeout(&self) -> Duration {
        Duration::from_secs(self.foreground_timeout_secs)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_secs(self.background_timeout_secs)
    }
}

impl GdprConfig {
    pub fn to_record(&self) -> ConsentRecord {
        ConsentRecord {
            basis: self.basis,
            document_id: self.document_id.clone(),
            document_version: self.document_version.clone(),
            description: self.document_description.clone(),
        }
    }
}

impl FragmentConfig {
    pub fn to_fragment(&self) -> Result<ContextFragment, DomainError> {
        ContextFragment::new(self.schema.clone(), self.data.clone())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"emitter.emit_range"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Valid values for `tracker.platform`.
const VALID_PLATFORMS: &[&str] = &["mob", "pc", "web", "srv", "app", "tv", "cnsl", "iot"];

/// Upper bound for `emitter.thread_pool_size`.
const MAX_THREAD_POOL_SIZE: usize = 256;

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn must_not_be_blank(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- network ---
        if self.network.endpoint.trim().is_empty() {
            must_not_be_blank(&mut errors, "network.endpoint", &self.network.endpoint);
        } else {
            match self.network.collector_url() {
                Ok(url) if url.host_str().is_some() => {}
                Ok(_) => errors.push(ValidationError {
                    field: "network.endpoint".into(),
                    message: format!("missing host in '{}'", self.network.endpoint),
                }),
                Err(e) => errors.push(ValidationError {
                    field: "network.endpoint".into(),
                    message: format!("invalid URL '{}': {e}", self.network.endpoint),
                }),
            }
        }
        must_be_positive(
            &mut errors,
            "network.request_timeout_secs",
            self.network.request_timeout_secs,
        );

        // --- tracker ---
        must_not_be_blank(&mut errors, "tracker.namespace", &self.tracker.namespace);
        must_not_be_blank(&mut errors, "tracker.app_id", &self.tracker.app_id);
        if !VALID_PLATFORMS.contains(&self.tracker.platform.as_str()) {
            errors.push(ValidationError {
                field: "tracker.platform".into(),
                message: format!(
                    "invalid platform '{}'; valid options: {}",
                    self.tracker.platform,
                    VALID_PLATFORMS.join(", ")
                ),
            });
        }

        // --- emitter ---
        if self.emitter.thread_pool_size == 0 || self.emitter.thread_pool_size > MAX_THREAD_POOL_SIZE
        {
            errors.push(ValidationError {
                field: "emitter.thread_pool_size".into(),
                message: format!("must be in range 1..={MAX_THREAD_POOL_SIZE}"),
            });
        }
        must_be_positive(&mut errors, "emitter.emit_range", self.emitter.emit_range as u64);
        if self.emitter.byte_limit_post <= crate::domain::payload::envelope_overhead() {
            errors.push(ValidationError {
                field: "emitter.byte_limit_post".into(),
                message: format!(
                    "must exceed the {} byte request envelope",
                    crate::domain::payload::envelope_overhead()
                ),
            });
        }
        must_be_positive(
            &mut errors,
            "emitter.flush_timeout_secs",
            self.emitter.flush_timeout_secs,
        );
        let retry = &self.emitter.retry;
        must_be_positive(
            &mut errors,
            "emitter.retry.max_attempts",
            u64::from(retry.max_attempts),
        );
        if retry.max_attempts > 1 {
            must_be_positive(
                &mut errors,
                "emitter.retry.initial_backoff_ms",
                retry.initial_backoff_ms,
            );
            if retry.max_backoff_ms < retry.initial_backoff_ms {
                errors.push(ValidationError {
                    field: "emitter.retry.max_backoff_ms".into(),
                    message: format!(
                        "max_backoff_ms ({}) must not be less than initial_backoff_ms ({})",
                        retry.max_backoff_ms, retry.initial_backoff_ms
                    ),
                });
            }
        }

        // --- session ---
        must_be_positive(
            &mut errors,
            "session.foreground_timeout_secs",
            self.session.foreground_timeout_secs,
        );
        must_be_positive(
            &mut errors,
            "session.background_timeout_secs",
            self.session.background_timeout_secs,
        );

        // --- gdpr ---
        if let Some(gdpr) = &self.gdpr {
            if let Some(id) = &gdpr.document_id {
                must_not_be_blank(&mut errors, "gdpr.document_id", id);
            }
        }

        // --- global_contexts ---
        let mut tags = HashSet::new();
        for (i, rule_set) in self.global_contexts.iter().enumerate() {
            must_not_be_blank(
                &mut errors,
                &format!("global_contexts[{i}].tag"),
                &rule_set.tag,
            );
            if !tags.insert(rule_set.tag.as_str()) {
                errors.push(ValidationError {
                    field: format!("global_contexts[{i}].tag"),
                    message: format!("duplicate tag '{}'", rule_set.tag),
                });
            }
            for (j, fragment) in rule_set.contexts.iter().enumerate() {
                if let Err(e) = validate_schema(&fragment.schema) {
                    errors.push(ValidationError {
                        field: format!("global_contexts[{i}].contexts[{j}].schema"),
                        message: e.to_string(),
                    });
                }
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- metrics ---
        if self.metrics.enabled && self.metrics.endpoint.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "metrics.endpoint".into(),
                message: format!("invalid socket address '{}'", self.metrics.endpoint),
            });
        }

        errors
    }
}
