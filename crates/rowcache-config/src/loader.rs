//! Configuration loader with layered sources.

use crate::CacheSettings;
use config::{Config, ConfigError, Environment, File};
use rowcache_core::RowCacheError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct SettingsLoader {
    settings: Arc<RwLock<CacheSettings>>,
    config_dir: String,
}

impl SettingsLoader {
    /// Creates a new settings loader.
    ///
    /// Settings are loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides (not committed)
    /// 4. Environment variables with `ROWCACHE__` prefix
    pub fn new(config_dir: impl Into<String>) -> Result<Self, RowCacheError> {
        let config_dir = config_dir.into();
        let settings = Self::load_settings(&config_dir)?;

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            config_dir,
        })
    }

    /// Loads settings from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, RowCacheError> {
        Self::new("./config")
    }

    /// Returns the current settings.
    pub async fn get(&self) -> CacheSettings {
        self.settings.read().await.clone()
    }

    /// Reloads the settings from disk.
    pub async fn reload(&self) -> Result<(), RowCacheError> {
        let new_settings = Self::load_settings(&self.config_dir)?;
        let mut settings = self.settings.write().await;
        *settings = new_settings;
        info!("Cache settings reloaded successfully");
        Ok(())
    }

    /// Loads settings from the specified directory.
    fn load_settings(config_dir: &str) -> Result<CacheSettings, RowCacheError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("ROWCACHE_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading cache settings for environment: {}", environment);

        let mut builder = Config::builder();

        // 1. Load default configuration
        let default_path = format!("{}/default.toml", config_dir);
        if Path::new(&default_path).exists() {
            debug!("Loading default settings from: {}", default_path);
            builder = builder.add_source(File::with_name(&default_path).required(false));
        }

        // 2. Load environment-specific configuration
        let env_path = format!("{}/{}.toml", config_dir, environment);
        if Path::new(&env_path).exists() {
            debug!("Loading environment settings from: {}", env_path);
            builder = builder.add_source(File::with_name(&env_path).required(false));
        }

        // 3. Load local overrides (not committed to version control)
        let local_path = format!("{}/local.toml", config_dir);
        if Path::new(&local_path).exists() {
            debug!("Loading local settings from: {}", local_path);
            builder = builder.add_source(File::with_name(&local_path).required(false));
        }

        // 4. Override with environment variables (ROWCACHE_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("ROWCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error)?;

        let settings: CacheSettings = config.try_deserialize().map_err(config_error)?;

        Self::validate_settings(&settings)?;

        Ok(settings)
    }

    /// Validates the settings.
    fn validate_settings(settings: &CacheSettings) -> Result<(), RowCacheError> {
        if settings.group(&settings.default_group).is_none() {
            return Err(RowCacheError::configuration(format!(
                "Default group '{}' is not defined",
                settings.default_group
            )));
        }

        for (name, group) in &settings.groups {
            if group.enabled && group.url.is_empty() {
                return Err(RowCacheError::configuration(format!(
                    "Group '{}' is enabled but has no URL",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn config_error(err: ConfigError) -> RowCacheError {
    RowCacheError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupSettings;

    #[tokio::test]
    async fn test_default_settings_validate() {
        let settings = CacheSettings::default();
        assert!(SettingsLoader::validate_settings(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_missing_default_group_rejected() {
        let mut settings = CacheSettings::default();
        settings.default_group = "sessions".to_string();

        let err = SettingsLoader::validate_settings(&settings).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_enabled_group_needs_url() {
        let mut settings = CacheSettings::default();
        settings.groups.insert(
            "sessions".to_string(),
            GroupSettings {
                url: String::new(),
                pool_size: 4,
                enabled: true,
            },
        );

        let err = SettingsLoader::validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("sessions"));
    }
}
