use super::PenpiConfig;
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

/// `config.toml` in the platform configuration directory, if one exists
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "penpi", "penpi").map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn parse_config(content: &str) -> Result<PenpiConfig> {
    Ok(toml::from_str(content)?)
}

/// Load, merge environment overrides and validate.
///
/// An explicit path must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub async fn load_config(explicit: Option<&Path>) -> Result<PenpiConfig> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            read_config_file(path).await?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => read_config_file(&path).await?,
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                PenpiConfig::default()
            }
        },
    };

    config.merge_env_vars();
    config.validate()?;

    Ok(config)
}

async fn read_config_file(path: &Path) -> Result<PenpiConfig> {
    tracing::debug!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path).await?;
    parse_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
