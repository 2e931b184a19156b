//! Configuration loader.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use expozy_core::OrchestratorError;
use std::path::Path;
use tracing::{debug, info, warn};

/// Loads and validates an [`AppConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `{config_dir}/default.toml`, then
    /// `{config_dir}/{environment}.toml`, then `{config_dir}/local.toml`,
    /// then `EXPOZY_`-prefixed environment variables, in ascending
    /// precedence. Fails fast on a malformed or missing required value.
    pub fn load(config_dir: &str) -> Result<AppConfig, OrchestratorError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("no .env file found or failed to load it: {e}");
        }

        let environment =
            std::env::var("EXPOZY_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        info!(environment = %environment, "loading configuration");

        let mut builder = Config::builder();

        let default_path = format!("{config_dir}/default.toml");
        if Path::new(&default_path).exists() {
            builder = builder.add_source(File::with_name(&default_path).required(false));
        }

        let env_path = format!("{config_dir}/{environment}.toml");
        if Path::new(&env_path).exists() {
            builder = builder.add_source(File::with_name(&env_path).required(false));
        }

        let local_path = format!("{config_dir}/local.toml");
        if Path::new(&local_path).exists() {
            builder = builder.add_source(File::with_name(&local_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("EXPOZY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(config_error_to_orchestrator_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_orchestrator_error)?;

        Self::validate(&app_config)?;
        Ok(app_config)
    }

    /// Loads from the conventional `./config` directory.
    pub fn from_default_location() -> Result<AppConfig, OrchestratorError> {
        Self::load("./config")
    }

    fn validate(config: &AppConfig) -> Result<(), OrchestratorError> {
        if config.database.url.is_empty() {
            return Err(OrchestratorError::Configuration(
                "database.url is required".to_string(),
            ));
        }
        if config.redis.url.is_empty() {
            return Err(OrchestratorError::Configuration(
                "redis.url is required".to_string(),
            ));
        }
        if config.webhook.secret_token.is_empty() {
            if config.app.environment == "production" {
                return Err(OrchestratorError::Configuration(
                    "webhook.secret_token is required in production".to_string(),
                ));
            }
            warn!("webhook.secret_token is empty; every request will be rejected");
        }
        if config.model.provider == "http" && config.model.endpoint.is_none() {
            return Err(OrchestratorError::Configuration(
                "model.endpoint is required when model.provider is \"http\"".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_error_to_orchestrator_error(err: ConfigError) -> OrchestratorError {
    OrchestratorError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_database_url() {
        let config = AppConfig::default();
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn accepts_fully_populated_dev_config() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/expozy".to_string();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn requires_model_endpoint_for_http_provider() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/expozy".to_string();
        config.model.provider = "http".to_string();
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }
}
