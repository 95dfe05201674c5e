//! Terminal output for `omnitel` commands
//!
//! Human output goes to the terminal as short status lines; with `--json`
//! each command prints one JSON document on stdout and diagnostics as JSON
//! lines on stderr.

use omnitel_emitter::EmitterStats;
use serde_json::{json, Value};

/// Selected with the global `--json` flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Sink for command results and diagnostics
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    /// Detail line; dropped in JSON mode
    fn info(&self, message: &str);
    fn print_json(&self, value: &Value);
    /// Delivery counters of a finished pipeline run
    fn stats(&self, stats: &EmitterStats);
}

pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &Value) {}
    fn stats(&self, stats: &EmitterStats) {
        let rows = [
            ("Enqueued", stats.events_enqueued),
            ("Delivered", stats.events_succeeded),
            ("Failed", stats.events_failed),
            ("Dropped", stats.events_dropped),
            ("Batches", stats.batches_completed),
            ("In flight", stats.in_flight()),
            ("Buffered", stats.buffered),
        ];
        for (label, count) in rows {
            if count > 0 || matches!(label, "Enqueued" | "Delivered") {
                self.info(&format!("{label:<10} {count}"));
            }
        }
    }
}

pub struct JsonFormatter;

impl JsonFormatter {
    fn stderr_line(level: &str, message: &str) {
        eprintln!("{}", json!({ "level": level, "message": message }));
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({ "success": true, "message": message }));
    }
    fn error(&self, message: &str) {
        Self::stderr_line("error", message);
    }
    fn warn(&self, message: &str) {
        Self::stderr_line("warning", message);
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => Self::stderr_line("error", &e.to_string()),
        }
    }
    fn stats(&self, stats: &EmitterStats) {
        self.print_json(&json!({ "stats": stats }));
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
