//! Config command - view, edit and validate the Omnitel configuration

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use omnitel_core::config::{Config, HttpMethod, Protocol};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};
use crate::ConfigSource;

/// Keys accepted by `config set`, with a short description
const SETTABLE_KEYS: &[(&str, &str)] = &[
    ("network.endpoint", "Collector host or URL"),
    ("network.method", "post|get"),
    ("network.protocol", "http|https"),
    ("network.request_timeout_secs", "Per-request timeout"),
    ("tracker.namespace", "Tracker namespace"),
    ("tracker.app_id", "Application id"),
    ("tracker.platform", "Platform code (mob, pc, srv, ...)"),
    ("emitter.thread_pool_size", "Concurrent batch deliveries"),
    ("emitter.emit_range", "Events per batch"),
    ("emitter.byte_limit_post", "Max POST body size in bytes"),
    ("emitter.flush_timeout_secs", "Flush timeout on exit"),
    ("session.foreground_timeout_secs", "Foreground session timeout"),
    ("session.background_timeout_secs", "Background session timeout"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "pretty|json"),
    ("metrics.enabled", "true|false"),
    ("metrics.endpoint", "Metrics listen address"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "emitter.emit_range")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, source: &ConfigSource, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(source, format),
            ConfigCommand::Set { key, value } => execute_set(source, key, value, format),
            ConfigCommand::Validate => execute_validate(source, format),
        }
    }
}

fn execute_show(source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = source.load()?;

    info!(config_path = %source.path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", source.path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_set(source: &ConfigSource, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = source.load()?;

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SETTABLE_KEYS {
                formatter.info(&format!("  {:<36} {}", name, help));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!(
                "Invalid value for '{}': {}",
                key,
                errors.join("; ")
            ));
        }
        return Ok(());
    }

    if let Some(parent) = source.path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(&source.path, yaml).context("Failed to write configuration file")?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": source.path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", source.path.display()));
    }
    Ok(())
}

fn execute_validate(source: &ConfigSource, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = source.path.display().to_string();

    if !source.path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": !source.explicit,
                "config_path": path,
                "errors": ["Configuration file not found"],
            }));
        } else if source.explicit {
            formatter.error(&format!("Configuration file not found at {}", path));
        } else {
            formatter.info(&format!("Configuration file not found at {}", path));
            formatter.info("Using default configuration. Run 'omnitel config set <key> <value>' to create one.");
        }
        return Ok(());
    }

    let config = match Config::load(&source.path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": path,
                    "errors": [format!("Failed to parse configuration: {}", e)],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {}", e));
                formatter.info(&format!("File: {}", path));
            }
            return Ok(());
        }
    };

    info!(config_path = %path, "Validating configuration");
    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path,
            "errors": errors,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path));
    } else {
        formatter.error(&format!("Configuration has {} error(s)", errors.len()));
        for error in &errors {
            formatter.info(&format!("- {}", error));
        }
    }
    Ok(())
}

/// Applies a dot-notation `key` to `config`, parsing `value` for the
/// field's type.
pub fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "network.endpoint" => config.network.endpoint = value.to_string(),
        "network.method" => config.network.method = parse_enum::<HttpMethod>(key, value)?,
        "network.protocol" => config.network.protocol = parse_enum::<Protocol>(key, value)?,
        "network.request_timeout_secs" => {
            config.network.request_timeout_secs = parse_number(key, value)?
        }
        "tracker.namespace" => config.tracker.namespace = value.to_string(),
        "tracker.app_id" => config.tracker.app_id = value.to_string(),
        "tracker.platform" => config.tracker.platform = value.to_string(),
        "emitter.thread_pool_size" => config.emitter.thread_pool_size = parse_number(key, value)?,
        "emitter.emit_range" => config.emitter.emit_range = parse_number(key, value)?,
        "emitter.byte_limit_post" => config.emitter.byte_limit_post = parse_number(key, value)?,
        "emitter.flush_timeout_secs" => {
            config.emitter.flush_timeout_secs = parse_number(key, value)?
        }
        "session.foreground_timeout_secs" => {
            config.session.foreground_timeout_secs = parse_number(key, value)?
        }
        "session.background_timeout_secs" => {
            config.session.background_timeout_secs = parse_number(key, value)?
        }
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),
        "metrics.enabled" => {
            config.metrics.enabled = value
                .parse()
                .map_err(|_| anyhow!("'{}' expects true or false, got '{}'", key, value))?
        }
        "metrics.endpoint" => config.metrics.endpoint = value.to_string(),
        _ => bail!("Unknown configuration key '{}'", key),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("'{}' expects a non-negative integer, got '{}'", key, value))
}

fn parse_enum<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    serde_yaml::from_str(&value.to_lowercase())
        .map_err(|_| anyhow!("'{}' does not accept '{}'", key, value))
}
