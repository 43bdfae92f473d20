use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_BATCH_SIZE: usize = 50;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server base URL (e.g., "https://api.example.com")
    pub server_url: Option<String>,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
    /// Maximum number of queue items sent per push
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SyncConfig {
    /// Returns true if sync is configured (has both server_url and api_key)
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the local store
    pub data_dir: ConfigValue<PathBuf>,
    /// Lifetime of cache entries written from the CLI
    pub cache_ttl_secs: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    cache_ttl_secs: Option<u64>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut cache_ttl_secs = ConfigValue::new(DEFAULT_CACHE_TTL_SECS, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(ttl) = file_config.cache_ttl_secs {
                cache_ttl_secs = ConfigValue::new(ttl, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("CALAI_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(ttl) = std::env::var("CALAI_CACHE_TTL_SECS") {
            let ttl = ttl
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("CALAI_CACHE_TTL_SECS", ttl))?;
            cache_ttl_secs = ConfigValue::new(ttl, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("CALAI_SYNC_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("CALAI_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }

        Ok(Self {
            data_dir,
            cache_ttl_secs,
            config_file,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/calai/
    /// - macOS: ~/Library/Application Support/calai/
    /// - Windows: %APPDATA%/calai/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calai")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/calai/
    /// - macOS: ~/Library/Application Support/calai/
    /// - Windows: %APPDATA%/calai/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calai")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.ends_with("calai"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert_eq!(config.cache_ttl_secs.value, 3600);
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.config_file, None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/calai").unwrap();
        writeln!(file, "cache_ttl_secs: 60").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: https://sync.example.com").unwrap();
        writeln!(file, "  api_key: secret").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/calai"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.cache_ttl_secs.value, 60);
        assert_eq!(config.cache_ttl_secs.source, ConfigSource::File);
        assert!(config.sync.is_configured());
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: store\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("store"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "cache_ttl_secs: 60\n").unwrap();

        std::env::set_var("CALAI_CACHE_TTL_SECS", "5");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.cache_ttl_secs.value, 5);
        assert_eq!(config.cache_ttl_secs.source, ConfigSource::Environment);

        std::env::remove_var("CALAI_CACHE_TTL_SECS");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_sync_not_configured_without_key() {
        let sync = SyncConfig {
            server_url: Some("https://sync.example.com".to_string()),
            ..SyncConfig::default()
        };
        assert!(!sync.is_configured());
    }
}
