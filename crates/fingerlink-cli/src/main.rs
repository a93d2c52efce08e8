//! fingerlink command-line driver.
//!
//! Runs the acquisition engine against the simulated reader and matching
//! engine, so the whole event flow can be exercised without hardware.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use fingerlink_acquire::Engine;
use fingerlink_core::EngineConfig;
use fingerlink_hardware::mock::{MockMatchEngine, MockReader};
use fingerlink_hardware::{AnyMatchEngine, AnyReaderDriver};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_configuration(cli.config.as_deref())?;

    let (driver, reader) = MockReader::new();
    for name in &cli.readers {
        reader.attach_reader(name.clone());
    }
    let (matcher, _) = MockMatchEngine::new();
    let engine = Engine::new(
        AnyReaderDriver::Mock(driver),
        AnyMatchEngine::Mock(matcher),
        config,
    )?;
    engine.init();

    let result = match &cli.command {
        Commands::Readers => commands::readers(&engine).await,
        Commands::Acquire {
            options,
            select,
            fingers,
        } => commands::acquire(&engine, &reader, options, select.as_deref(), fingers).await,
        Commands::Compare { feature, template } => {
            commands::compare(&engine, feature, template).await
        }
        Commands::Identify { feature, templates } => {
            commands::identify(&engine, feature, templates).await
        }
    };

    engine.exit();
    result
}

/// Logging goes to stderr so stdout carries only command output.
/// `RUST_LOG` overrides the verbosity flag.
fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_configuration(path: Option<&str>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    info!("Loading configuration from {}", path);
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    Ok(EngineConfig::from_json(&json)?)
}
