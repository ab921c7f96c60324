// Config module
// Environment configuration with logged defaults

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use log::{info, warn, LevelFilter};

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/elearning.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub log_level: LevelFilter,
    pub cors_max_age_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_path: try_load("DATABASE_PATH", DEFAULT_DB_PATH)?,
            log_level: try_load("LOG_LEVEL", "info")?,
            cors_max_age_secs: try_load("CORS_MAX_AGE_SECS", "3600")?,
        })
    }

    /// Log level alone, read before the logger exists so `load` can report its defaults.
    pub fn log_level() -> Result<LevelFilter> {
        try_load("LOG_LEVEL", "info")
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{e}")
        })
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
