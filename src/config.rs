// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Credentials, TargetConfig};

/// Load configuration from a TOML file and validate it.
///
/// A missing file yields the defaults; a file that exists but does not
/// parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {e}", path.display())))?
    } else {
        log::warn!("Config file {:?} not found, using defaults", path);
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

/// Look up a configured target and its credentials.
pub fn target_with_credentials<'a>(
    config: &'a Config,
    id: &str,
) -> Result<(&'a TargetConfig, Option<Credentials>)> {
    let target = config
        .target(id)
        .ok_or_else(|| AppError::config(format!("Unknown target '{id}'")))?;
    let credentials = target.credentials();
    if credentials.is_none() {
        log::debug!("No credentials in environment for target {}", id);
    }
    Ok((target, credentials))
}
