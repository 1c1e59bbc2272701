//! Command routing and execution

use crate::bridge::ProcessBridge;
use crate::cli::args::Commands;
use crate::config::PenpiConfig;
use crate::transport::{console, CommandCharacteristic};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Option<Commands>, config: PenpiConfig) -> Result<()> {
    match command {
        Some(Commands::Console { shell, home }) => run_console(config, shell, home).await,
        Some(Commands::Config) => print_config(&config),
        None => run_console(config, None, None).await,
    }
}

/// Apply command line overrides on top of the loaded configuration
pub fn apply_overrides(
    mut config: PenpiConfig,
    shell: Option<String>,
    home: Option<PathBuf>,
) -> crate::Result<PenpiConfig> {
    if let Some(program) = shell {
        config.shell.program = program;
    }
    if let Some(home) = home {
        config.shell.home_dir = Some(home);
    }
    config.validate()?;
    Ok(config)
}

async fn run_console(
    config: PenpiConfig,
    shell: Option<String>,
    home: Option<PathBuf>,
) -> Result<()> {
    let config = apply_overrides(config, shell, home)?;

    let bridge = ProcessBridge::spawn(&config.shell, config.bridge.quiescence_window)
        .await
        .with_context(|| format!("Failed to start shell {}", config.shell.program))?
        .with_max_drain(config.bridge.max_drain);

    let (sink, events) = console::channel();
    let characteristic =
        CommandCharacteristic::new(Arc::new(bridge), sink, config.bridge.poll_interval);

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    });

    let session = console::run(
        &characteristic,
        events,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
    )
    .await;

    ctrl_c.abort();
    characteristic.shutdown().await;
    debug!("Console finished");

    session.context("Console session failed")
}

fn print_config(config: &PenpiConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
