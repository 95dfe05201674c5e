//! Omnitel CLI - drive the telemetry pipeline from the command line
//!
//! Provides commands for:
//! - Tracking one-off structured events
//! - Running a steady event stream with the metrics endpoint up
//! - Viewing, editing and validating configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use omnitel_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, run::RunCommand, track::TrackCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "omnitel", version, about = "Product telemetry pipeline")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track structured events and wait for delivery
    Track(TrackCommand),
    /// Emit events on an interval until interrupted
    Run(RunCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Where the configuration comes from for this invocation.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Set when the path was given with `--config`
    pub explicit: bool,
}

impl ConfigSource {
    fn new(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self {
                path,
                explicit: true,
            },
            None => Self {
                path: Config::default_path(),
                explicit: false,
            },
        }
    }

    /// An explicit file must exist and parse; the default location may be
    /// absent, in which case defaults apply.
    pub fn load(&self) -> Result<Config> {
        if self.explicit || self.path.exists() {
            Config::load(&self.path)
                .with_context(|| format!("Failed to load {}", self.path.display()))
        } else {
            Ok(Config::default())
        }
    }
}

fn init_tracing(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = ConfigSource::new(cli.config);
    let format = OutputFormat::from_flag(cli.json);

    // A broken file is reported by `config validate`, not here.
    let logging = source.load().unwrap_or_default();
    init_tracing(&logging, cli.verbose);

    match cli.command {
        Commands::Track(cmd) => cmd.execute(&source, format).await,
        Commands::Run(cmd) => cmd.execute(&source, format).await,
        Commands::Config(cmd) => cmd.execute(&source, format).await,
    }
}
