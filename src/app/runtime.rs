//! Runtime initialization and setup

use crate::app::{config::AppConfig, logging::init_logging};
use crate::config::{load_config, PenpiConfig};
use anyhow::{Context, Result};
use tracing::debug;

/// Set up logging and load the layered configuration
pub async fn initialize_app(config: &AppConfig) -> Result<PenpiConfig> {
    init_logging(config);

    let penpi = load_config(config.config_path.as_deref())
        .await
        .context("Failed to load configuration")?;
    debug!("Effective configuration: {:?}", penpi);

    Ok(penpi)
}
