//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use reading_groups_core::content::{DEFAULT_PDF_BASE_URL, DEFAULT_PSALMS_BASE_URL};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When unset the service keeps its data in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    /// Public origin used in the sitemap and robots.txt.
    pub site_url: String,
    pub cors_origin: HeaderValue,
    pub pdf_base_url: String,
    pub psalms_base_url: String,
    /// `None` disables the background sweeper.
    pub sweep_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            site_url: "http://localhost:3000".to_string(),
            cors_origin: HeaderValue::from_static("http://localhost:5173"),
            pdf_base_url: DEFAULT_PDF_BASE_URL.to_string(),
            psalms_base_url: DEFAULT_PSALMS_BASE_URL.to_string(),
            sweep_interval: Some(Duration::from_secs(600)),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Server and Database Settings ---
        let bind_address = match lookup("BIND_ADDRESS") {
            Some(s) => s.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            None => defaults.bind_address,
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Public Site Settings ---
        let site_url = lookup("SITE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.site_url);

        let cors_origin = match lookup("CORS_ORIGIN") {
            Some(s) => HeaderValue::from_str(&s).map_err(|e| {
                ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
            })?,
            None => defaults.cors_origin,
        };

        // --- Content Locations ---
        let pdf_base_url = lookup("PDF_BASE_URL").unwrap_or(defaults.pdf_base_url);
        let psalms_base_url = lookup("PSALMS_BASE_URL").unwrap_or(defaults.psalms_base_url);

        // --- Background Sweeper ---
        let sweep_interval = match lookup("SWEEP_INTERVAL_SECS") {
            Some(s) => {
                let secs = s.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("SWEEP_INTERVAL_SECS".to_string(), e.to_string())
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => defaults.sweep_interval,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            site_url,
            cors_origin,
            pdf_base_url,
            psalms_base_url,
            sweep_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert!(config.database_url.is_none());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(600)));
    }

    #[test]
    fn zero_interval_disables_sweeper() {
        let config = load(&[("SWEEP_INTERVAL_SECS", "0")]).unwrap();
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[("BIND_ADDRESS", "nope")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "BIND_ADDRESS"
        ));
        assert!(matches!(
            load(&[("RUST_LOG", "loud")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"
        ));
        assert!(matches!(
            load(&[("SWEEP_INTERVAL_SECS", "-1")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "SWEEP_INTERVAL_SECS"
        ));
    }

    #[test]
    fn site_url_loses_trailing_slash() {
        let config = load(&[("SITE_URL", "https://tanya.example/"), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(config.site_url, "https://tanya.example");
        assert!(config.database_url.is_none());
    }
}
