//! Configuration loading
//!
//! Resolution order, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file
//! 3. `CLUBHOUSE_*` environment variables

use std::path::Path;

use tracing::{debug, info};

use crate::config::{ClubhouseConfig, ConfigError};

/// Environment variable overriding `table.name`
pub const ENV_TABLE_NAME: &str = "CLUBHOUSE_TABLE_NAME";
/// Environment variable overriding `table.region`
pub const ENV_REGION: &str = "CLUBHOUSE_REGION";
/// Environment variable overriding `table.endpoint`
pub const ENV_ENDPOINT: &str = "CLUBHOUSE_ENDPOINT";
/// Environment variable overriding `table.timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "CLUBHOUSE_TIMEOUT_MS";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "CLUBHOUSE_LOG_LEVEL";

/// Loads and validates [`ClubhouseConfig`]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse a TOML document, apply process environment overrides and validate
    pub fn load_from_str(contents: &str) -> Result<ClubhouseConfig, ConfigError> {
        let mut config: ClubhouseConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, apply process environment overrides and validate
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<ClubhouseConfig, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::load_from_str(&contents)
    }

    /// Load from `path` when given, otherwise from defaults plus environment
    pub async fn load(path: Option<&Path>) -> Result<ClubhouseConfig, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path).await,
            None => {
                debug!("No config file given, using defaults");
                let mut config = ClubhouseConfig::default();
                Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply `CLUBHOUSE_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(
        config: &mut ClubhouseConfig,
        lookup: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_TABLE_NAME) {
            config.table.name = name;
        }
        if let Some(region) = lookup(ENV_REGION) {
            config.table.region = Some(region);
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.table.endpoint = Some(endpoint);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            config.table.timeout_ms =
                timeout
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: ENV_TIMEOUT_MS.to_string(),
                        value: format!("'{}' is not a number of milliseconds", timeout),
                    })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_table_settings() {
        let mut config = ClubhouseConfig::default();
        ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[
                (ENV_TABLE_NAME, "club-prod"),
                (ENV_ENDPOINT, "http://localhost:8000"),
                (ENV_TIMEOUT_MS, "1500"),
            ]),
        )
        .unwrap();

        assert_eq!(config.table.name, "club-prod");
        assert_eq!(config.table.endpoint.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.table.timeout_ms, 1500);
        assert_eq!(config.table.region, None);
    }

    #[test]
    fn test_env_override_rejects_bad_timeout() {
        let mut config = ClubhouseConfig::default();
        let result = ConfigLoader::apply_env_overrides(
            &mut config,
            lookup_from(&[(ENV_TIMEOUT_MS, "soon")]),
        );

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClubhouseConfig = toml::from_str(
            r#"
            [table]
            name = "volunteers"

            [assignment]
            max_candidates = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.table.name, "volunteers");
        assert_eq!(config.table.timeout_ms, 3_000);
        assert_eq!(config.assignment.max_candidates, 40);
        assert_eq!(config.assignment.contention_factor, 3);
        assert_eq!(config.query.default_limit, 20);
    }
}
