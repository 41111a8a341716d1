//! Bootstrap configuration for the matching service
//!
//! Two tiers:
//! 1. **TOML bootstrap**: listen address, database path, logging, cache
//!    backend and TTLs (read once at startup)
//! 2. **Database runtime**: tunables in the `settings` table
//!    (see [`crate::db::init::ensure_setting`])
//!
//! Priority: command-line arguments / environment > TOML file > built-in
//! defaults.

use crate::cache::CacheBackend;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "matching.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Cache backend and entry lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_recommendations_ttl")]
    pub recommendations_ttl_secs: u64,
    #[serde(default = "default_popular_tags_ttl")]
    pub popular_tags_ttl_secs: u64,
    #[serde(default = "default_user_tags_ttl")]
    pub user_tags_ttl_secs: u64,
    /// Seconds between sweeps of expired entries
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            recommendations_ttl_secs: default_recommendations_ttl(),
            popular_tags_ttl_secs: default_popular_tags_ttl(),
            user_tags_ttl_secs: default_user_tags_ttl(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl CacheConfig {
    pub fn recommendations_ttl(&self) -> Duration {
        Duration::from_secs(self.recommendations_ttl_secs)
    }

    pub fn popular_tags_ttl(&self) -> Duration {
        Duration::from_secs(self.popular_tags_ttl_secs)
    }

    pub fn user_tags_ttl(&self) -> Duration {
        Duration::from_secs(self.user_tags_ttl_secs)
    }

    /// Purge interval, at least one second
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_recommendations_ttl() -> u64 {
    300
}

fn default_popular_tags_ttl() -> u64 {
    600
}

fn default_user_tags_ttl() -> u64 {
    1800
}

fn default_purge_interval() -> u64 {
    300
}

impl TomlConfig {
    /// Load configuration from `path`
    ///
    /// A missing file is not an error: built-in defaults are used and a
    /// warning is logged. A file that exists but fails to parse is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Effective database path (configured or platform default)
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| default_data_dir().join(DEFAULT_DATABASE_FILE))
    }
}

/// Platform data directory for the service
///
/// Linux: `~/.local/share/matching`, macOS: `~/Library/Application Support/matching`,
/// Windows: `%APPDATA%\matching`. Falls back to `./matching_data`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("matching"))
        .unwrap_or_else(|| PathBuf::from("./matching_data"))
}

/// Default config file location (`<config dir>/matching/config.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("matching").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.recommendations_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.popular_tags_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache.user_tags_ttl(), Duration::from_secs(1800));
        assert_eq!(config.cache.purge_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_sections() {
        let config = TomlConfig::parse(
            r#"
            [server]
            port = 6000

            [cache]
            backend = "sqlite"
            recommendations_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.recommendations_ttl_secs, 60);
        assert_eq!(config.cache.popular_tags_ttl_secs, 600);
    }

    #[test]
    fn test_zero_purge_interval_floors_to_one_second() {
        let config = TomlConfig::parse("[cache]\npurge_interval_secs = 0").unwrap();
        assert_eq!(config.cache.purge_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = TomlConfig::parse("[server\nport = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TomlConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_from_file_with_database_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/matching-test.db\"").unwrap();

        let config = TomlConfig::load(file.path()).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/matching-test.db"));
    }

    #[test]
    fn test_default_database_path_in_data_dir() {
        let config = TomlConfig::default();
        assert!(config.database_path().ends_with(DEFAULT_DATABASE_FILE));
    }
}
