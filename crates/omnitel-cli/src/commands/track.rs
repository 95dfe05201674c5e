//! Track command - send structured events through the full pipeline
//!
//! Builds the tracker from configuration, tracks the event `--count`
//! times, then flushes and reports the delivery counters.

use anyhow::{bail, Result};
use clap::Args;
use omnitel_core::domain::Event;
use serde_json::Value;
use tracing::info;

use super::Pipeline;
use crate::output::{get_formatter, OutputFormat};
use crate::ConfigSource;

#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Event category
    #[arg(long)]
    pub category: String,

    /// Event action
    #[arg(long)]
    pub action: String,

    /// Event label
    #[arg(long)]
    pub label: Option<String>,

    /// Numeric event value
    #[arg(long)]
    pub value: Option<f64>,

    /// Extra property as key=value; values that parse as JSON keep their type
    #[arg(long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// How many times to track the event
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Grant tracking consent for this run
    #[arg(long)]
    pub consent: bool,
}

impl TrackCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = source.load()?;
        self.build_event()?;

        let pipeline = Pipeline::start(&config, self.consent)?;
        info!(
            category = %self.category,
            action = %self.action,
            count = self.count,
            "Tracking events"
        );
        for _ in 0..self.count {
            pipeline.tracker.track(self.build_event()?);
        }

        let tracker = pipeline.tracker.clone();
        let drained = pipeline.stop().await;
        let stats = tracker.stats();

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "drained": drained,
                "stats": stats,
            }));
        } else {
            if stats.events_enqueued == 0 {
                formatter.warn("No events were enqueued (consent not granted?)");
            } else if stats.events_failed > 0 {
                formatter.warn(&format!("{} events were not delivered", stats.events_failed));
            } else {
                formatter.success(&format!("Delivered {} events", stats.events_succeeded));
            }
            formatter.stats(&stats);
        }
        Ok(())
    }

    /// Each call yields a fresh event id and timestamp.
    fn build_event(&self) -> Result<Event> {
        let mut event = Event::new(&self.category, &self.action);
        if let Some(label) = &self.label {
            event = event.with_label(label);
        }
        if let Some(value) = self.value {
            event = event.with_value(value);
        }
        for raw in &self.properties {
            let (key, value) = parse_property(raw)?;
            event = event.with_property(key, value);
        }
        event.validate()?;
        Ok(event)
    }
}

/// Splits `key=value`, reading the value as JSON when it parses and as a
/// plain string otherwise.
pub fn parse_property(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Property '{}' is not in key=value form", raw);
    };
    if key.trim().is_empty() {
        bail!("Property '{}' has an empty key", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}
