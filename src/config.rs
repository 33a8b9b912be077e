use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::auth::TokenSettings;
use crate::api::catalog::ClassificationRules;
use crate::api::client::ClientOptions;
use crate::api::constants::{
    DEFAULT_MAX_RECORD_COUNT, DEFAULT_REFERER, DEFAULT_REFRESH_BUFFER_MINUTES, DEFAULT_TOKEN_LIFETIME_MINUTES,
    DEFAULT_TOKEN_PATH, METADATA_TIMEOUT, QUERY_TIMEOUT,
};
use crate::api::logging::MonitoringConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    pub classification: ClassificationRules,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metadata_timeout_secs: u64,
    pub query_timeout_secs: u64,
    pub token_lifetime_minutes: u32,
    pub refresh_buffer_minutes: i64,
    pub token_path: String,
    pub referer: String,
    pub verify_tls: bool,
    pub default_max_record_count: u32,
    /// 0 re-reads the catalog on every operation
    pub catalog_cache_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: METADATA_TIMEOUT.as_secs(),
            query_timeout_secs: QUERY_TIMEOUT.as_secs(),
            token_lifetime_minutes: DEFAULT_TOKEN_LIFETIME_MINUTES,
            refresh_buffer_minutes: DEFAULT_REFRESH_BUFFER_MINUTES,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            verify_tls: true,
            default_max_record_count: DEFAULT_MAX_RECORD_COUNT,
            catalog_cache_ttl_secs: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            classification: ClassificationRules::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("arcgis-cli")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".arcgis-cli")
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Missing file means defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_content).with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        let settings = &config.settings;
        if settings.refresh_buffer_minutes < 0 {
            anyhow::bail!("refresh_buffer_minutes must not be negative");
        }
        if settings.refresh_buffer_minutes > i64::from(settings.token_lifetime_minutes) {
            anyhow::bail!(
                "refresh_buffer_minutes ({}) must not exceed token_lifetime_minutes ({})",
                settings.refresh_buffer_minutes,
                settings.token_lifetime_minutes
            );
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        debug!("Saving config to: {:?}", config_path);

        let config_content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    pub fn to_client_options(&self) -> ClientOptions {
        let settings = &self.settings;
        let metadata_timeout = Duration::from_secs(settings.metadata_timeout_secs);
        let refresh_buffer_minutes = settings
            .refresh_buffer_minutes
            .clamp(0, i64::from(settings.token_lifetime_minutes));

        ClientOptions {
            metadata_timeout,
            query_timeout: Duration::from_secs(settings.query_timeout_secs),
            token: TokenSettings {
                lifetime_minutes: settings.token_lifetime_minutes,
                refresh_buffer: ChronoDuration::minutes(refresh_buffer_minutes),
                token_path: settings.token_path.clone(),
                referer: settings.referer.clone(),
                timeout: metadata_timeout,
            },
            verify_tls: settings.verify_tls,
            catalog_cache_ttl: Duration::from_secs(settings.catalog_cache_ttl_secs),
            classification: self.classification.clone(),
            monitoring: self.monitoring.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.classification, ClassificationRules::default());

        let options = config.to_client_options();
        assert_eq!(options.metadata_timeout, Duration::from_secs(10));
        assert_eq!(options.query_timeout, Duration::from_secs(30));
        assert_eq!(options.token.refresh_buffer, ChronoDuration::minutes(5));
        assert_eq!(options.catalog_cache_ttl, Duration::ZERO);
    }

    #[test]
    fn test_partial_settings() {
        let config = Config::parse(
            r#"
            [settings]
            query_timeout_secs = 60
            verify_tls = false
            catalog_cache_ttl_secs = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.query_timeout_secs, 60);
        assert_eq!(config.settings.metadata_timeout_secs, 10);

        let options = config.to_client_options();
        assert!(!options.verify_tls);
        assert_eq!(options.catalog_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_classification_override() {
        let config = Config::parse(
            r#"
            [classification]
            hosted_folder = "Published"
            "#,
        )
        .unwrap();

        assert_eq!(config.classification.hosted_folder, "Published");
        assert_eq!(
            config.classification.system_folders,
            ClassificationRules::default().system_folders
        );
    }

    #[test]
    fn test_negative_refresh_buffer_rejected() {
        assert!(Config::parse("[settings]\nrefresh_buffer_minutes = -1").is_err());
    }

    #[test]
    fn test_refresh_buffer_bounded_by_lifetime() {
        let err = Config::parse("[settings]\nrefresh_buffer_minutes = 9223372036854775807").unwrap_err();
        assert!(err.to_string().contains("token_lifetime_minutes"));
        assert!(Config::parse("[settings]\ntoken_lifetime_minutes = 30\nrefresh_buffer_minutes = 30").is_ok());
    }

    #[test]
    fn test_client_options_clamp_refresh_buffer() {
        let mut config = Config::default();
        config.settings.refresh_buffer_minutes = i64::MAX;

        let options = config.to_client_options();
        assert_eq!(options.token.refresh_buffer, ChronoDuration::minutes(60));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("arcgis-cli-missing-config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.settings, Settings::default());
    }
}
