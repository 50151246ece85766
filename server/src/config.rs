//! Configuration management for the server.

use std::env;
use std::time::Duration;

/// Autosave timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a cycle starts
    pub debounce: Duration,
    /// How long `saved` / `error` stay visible before returning to idle
    pub saved_display: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            saved_display: Duration::from_millis(2000),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; records are kept in memory without one
    pub database_url: Option<String>,
    /// Maximum pool size
    pub database_max_connections: u32,
    /// Autosave timing
    pub autosave: AutosaveConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = var("DATABASE_URL").filter(|url| !url.is_empty());

        let database_max_connections = parse_number(&var, "DATABASE_MAX_CONNECTIONS", 10)?;

        let defaults = AutosaveConfig::default();
        let autosave = AutosaveConfig {
            debounce: Duration::from_millis(parse_number(
                &var,
                "AUTOSAVE_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )?),
            saved_display: Duration::from_millis(parse_number(
                &var,
                "AUTOSAVE_SAVED_DISPLAY_MS",
                defaults.saved_display.as_millis() as u64,
            )?),
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            autosave,
        })
    }
}

fn parse_number<F, T>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.autosave, AutosaveConfig::default());
    }

    #[test]
    fn overrides() {
        let config = Config::from_vars(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/quizdraft"),
            ("AUTOSAVE_DEBOUNCE_MS", "300"),
            ("AUTOSAVE_SAVED_DISPLAY_MS", "500"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/quizdraft")
        );
        assert_eq!(config.autosave.debounce, Duration::from_millis(300));
        assert_eq!(config.autosave.saved_display, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            Config::from_vars(lookup(&[("PORT", "http")])),
            Err(ConfigError::InvalidPort)
        ));
        assert!(matches!(
            Config::from_vars(lookup(&[("AUTOSAVE_DEBOUNCE_MS", "-1")])),
            Err(ConfigError::InvalidNumber("AUTOSAVE_DEBOUNCE_MS"))
        ));
    }
}
