//! Configuration management for Crosspost

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub apps: AppsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum due jobs picked up per pass
    #[serde(default = "default_job_batch_size")]
    pub job_batch_size: u32,
    /// How far ahead of expiry tokens are refreshed, in seconds
    #[serde(default = "default_refresh_lookahead_secs")]
    pub refresh_lookahead_secs: i64,
}

fn default_job_batch_size() -> u32 {
    10
}

fn default_refresh_lookahead_secs() -> i64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_batch_size: default_job_batch_size(),
            refresh_lookahead_secs: default_refresh_lookahead_secs(),
        }
    }
}

/// OAuth application credentials for one platform
///
/// Needed by refresh flows that authenticate as the app (Twitter, TikTok,
/// YouTube, LinkedIn, Pinterest). Platforms whose section is absent simply
/// do not get that capability registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppsConfig {
    pub twitter: Option<OAuthApp>,
    pub tiktok: Option<OAuthApp>,
    pub youtube: Option<OAuthApp>,
    pub linkedin: Option<OAuthApp>,
    pub pinterest: Option<OAuthApp>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosspost/crosspost.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            apps: AppsConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosspost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert!(config.database.path.ends_with("crosspost.db"));
        assert_eq!(config.scheduler.job_batch_size, 10);
        assert_eq!(config.scheduler.refresh_lookahead_secs, 3600);
        assert!(config.apps.twitter.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
            [database]
            path = "/tmp/test.db"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.scheduler.job_batch_size, 10);
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_env_override() {
        std::env::set_var("CROSSPOST_CONFIG", "/tmp/custom/crosspost.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom/crosspost.toml"));
        std::env::remove_var("CROSSPOST_CONFIG");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_default_location() {
        std::env::remove_var("CROSSPOST_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("crosspost/config.toml"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            path = "/tmp/test.db"

            [scheduler]
            job_batch_size = 25
            refresh_lookahead_secs = 7200

            [apps.twitter]
            client_id = "tw-client"
            client_secret = "tw-secret"

            [apps.pinterest]
            client_id = "pin-client"
            client_secret = "pin-secret"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.job_batch_size, 25);
        assert_eq!(config.scheduler.refresh_lookahead_secs, 7200);
        assert_eq!(config.apps.twitter.unwrap().client_id, "tw-client");
        assert!(config.apps.tiktok.is_none());
        assert!(config.apps.pinterest.is_some());
    }
}
