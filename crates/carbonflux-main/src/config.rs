// Copyright (c) 2026 Carbonflux Contributors
//
// This file is part of Carbonflux.
//
// Licensed under the MIT License. You may use, copy, modify, and distribute
// this file under the terms of that license.
//
// This software is provided "AS IS", without warranty of any kind.

//! TOML configuration loading. A missing or invalid configuration is
//! fatal; nothing is fetched before it validates.

use anyhow::{Context, Result};
use carbonflux_types::SystemConfig;
use std::path::Path;
use tracing::info;

/// Default configuration path, relative for portability.
pub const DEFAULT_CONFIG_PATH: &str = "./carbonflux.toml";

/// Environment variable overriding the configuration path.
pub const CONFIG_PATH_ENV: &str = "CARBONFLUX_CONFIG";

/// Load and validate configuration from an explicit path, the
/// environment override, or the default location, in that order.
pub fn load_config(explicit_path: Option<&str>) -> Result<SystemConfig> {
    let path = explicit_path
        .map(str::to_owned)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    load_config_from(Path::new(&path))
}

pub fn load_config_from(path: &Path) -> Result<SystemConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    info!(
        "Loaded configuration from {}: {} fuel entries, {} columns, feed {}",
        path.display(),
        config.intensity.fuels.len(),
        config.feed.columns.len(),
        config.feed.url
    );
    Ok(config)
}
