//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/linkapp/config.toml)
//! 3. Environment variables (LINKAPP_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "LINKAPP";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Explicit database file; defaults to `<data_dir>/linkapp.db`
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Logical database index inside the file
    #[serde(default)]
    pub db: u32,

    /// Links per page in listings
    #[serde(default = "default_per_page")]
    pub per_page: u64,

    /// How long to wait on a locked database, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: None,
            db: 0,
            per_page: default_per_page(),
            busy_timeout_ms: default_busy_timeout_ms(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LINKAPP_DATA_DIR, LINKAPP_DATABASE,
    ///    LINKAPP_DB, LINKAPP_PER_PAGE)
    /// 2. Config file (~/.config/linkapp/config.toml or LINKAPP_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_DATABASE", ENV_PREFIX)) {
            self.database = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_DB", ENV_PREFIX)) {
            self.db = val
                .parse()
                .with_context(|| format!("{}_DB must be a non-negative integer, got {:?}", ENV_PREFIX, val))?;
        }

        if let Ok(val) = std::env::var(format!("{}_PER_PAGE", ENV_PREFIX)) {
            self.per_page = val
                .parse()
                .with_context(|| format!("{}_PER_PAGE must be a positive integer, got {:?}", ENV_PREFIX, val))?;
        }

        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LINKAPP_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkapp")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.data_dir.join("linkapp.db"))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkapp")
}

fn default_per_page() -> u64 {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "LINKAPP_DATA_DIR",
        "LINKAPP_DATABASE",
        "LINKAPP_DB",
        "LINKAPP_PER_PAGE",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db, 0);
        assert_eq!(config.per_page, 10);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.database.is_none());
        assert!(config.data_dir.ends_with("linkapp"));
    }

    #[test]
    fn test_database_path() {
        let mut config = Config::default();
        assert!(config.database_path().ends_with("linkapp.db"));
        assert!(config.database_path().starts_with(&config.data_dir));

        config.database = Some(PathBuf::from("/srv/links.db"));
        assert_eq!(config.database_path(), PathBuf::from("/srv/links.db"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("LINKAPP_DATA_DIR", "/tmp/linkapp-test");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/linkapp-test"));
    }

    #[test]
    fn test_env_override_db_and_per_page() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LINKAPP_DB", "3");
        env::set_var("LINKAPP_PER_PAGE", "25");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.db, 3);
        assert_eq!(config.per_page, 25);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LINKAPP_DB", "primary");

        let err = config.apply_env_overrides().unwrap_err();
        assert!(err.to_string().contains("LINKAPP_DB"));
    }

    #[test]
    fn test_env_override_database() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LINKAPP_DATABASE", "/tmp/other.db");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/other.db")));

        // Empty string clears it
        env::set_var("LINKAPP_DATABASE", "");
        config.apply_env_overrides().unwrap();
        assert!(config.database.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/linkapp"),
            database: Some(PathBuf::from("/data/linkapp/links.db")),
            db: 2,
            per_page: 20,
            busy_timeout_ms: 250,
            log_file: None,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("per_page"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.database, config.database);
        assert_eq!(parsed.db, 2);
        assert_eq!(parsed.per_page, 20);
        assert_eq!(parsed.busy_timeout_ms, 250);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            db = 1
            log_file = "/var/log/linkapp.log"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.db, 1);
        assert_eq!(config.per_page, 10);
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/linkapp.log")));
    }

    #[test]
    fn test_load_from_path() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "per_page = 5\n").unwrap();

        env::set_var("LINKAPP_PER_PAGE", "7");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.per_page, 7);
    }

    #[test]
    fn test_save_to_path_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            db: 4,
            per_page: 3,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(loaded.db, 4);
        assert_eq!(loaded.per_page, 3);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert_eq!(config.db, 0);
        assert_eq!(config.per_page, 10);
    }
}
