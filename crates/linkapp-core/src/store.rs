//! Unified storage interface
//!
//! The `Store` opens the key-value engine and hands out the link,
//! reading-list and user repositories, all sharing one engine handle.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;
//!
//! let id = store.links().add(NewLink::new(title, desc, url, "admin", tags))?;
//! store.reading_list().add("admin", &id)?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::links::LinkRepository;
use crate::reading_list::ReadingListRepository;
use crate::storage::{KeyValueStore, SqliteStore};
use crate::users::UserRepository;

/// Username and password created by [`Store::reset`]
pub const DEFAULT_ADMIN: (&str, &str) = ("admin", "password");

/// Unified storage interface for linkapp
pub struct Store {
    engine: Arc<dyn KeyValueStore>,
    links: LinkRepository,
    reading_list: ReadingListRepository,
    users: UserRepository,
    config: Config,
}

impl Store {
    /// Open the store described by the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let path = config.database_path();
        let engine = SqliteStore::open_with_timeout(&path, config.db, config.busy_timeout())
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        info!("Opened {:?} (db {})", path, config.db);
        Ok(Self::with_engine(Arc::new(engine), config))
    }

    /// Open a throwaway in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let engine = SqliteStore::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self::with_engine(Arc::new(engine), Config::default()))
    }

    /// Wrap an already opened engine
    pub fn with_engine(engine: Arc<dyn KeyValueStore>, config: Config) -> Self {
        Self {
            links: LinkRepository::new(engine.clone()),
            reading_list: ReadingListRepository::new(engine.clone()),
            users: UserRepository::new(engine.clone()),
            engine,
            config,
        }
    }

    pub fn links(&self) -> &LinkRepository {
        &self.links
    }

    pub fn reading_list(&self) -> &ReadingListRepository {
        &self.reading_list
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Erase the logical database and create the default admin account
    pub fn reset(&self) -> Result<()> {
        self.engine.flushdb().context("Failed to clear database")?;
        let (username, password) = DEFAULT_ADMIN;
        self.users
            .add(username, password, false)
            .context("Failed to create admin user")?;
        info!("Database reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLink;
    use std::path::PathBuf;

    fn temp_config(dir: &tempfile::TempDir, db: u32) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            db,
            ..Config::default()
        }
    }

    fn add_link(store: &Store, url: &str) {
        store
            .links()
            .add(NewLink::new("T", "D", url, "admin", vec!["t".to_string()]))
            .unwrap();
    }

    #[test]
    fn test_open_with_config_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir, 0);

        let store = Store::open_with_config(config).unwrap();
        add_link(&store, "http://a.com");

        assert!(dir.path().join("linkapp.db").exists());
        assert_eq!(store.config().database_path(), dir.path().join("linkapp.db"));
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = Store::open_with_config(temp_config(&dir, 0)).unwrap();
            add_link(&store, "http://a.com");
        }

        let store = Store::open_with_config(temp_config(&dir, 0)).unwrap();
        assert!(store.links().url_exists("http://a.com").unwrap());
    }

    #[test]
    fn test_reset_only_clears_its_own_db() {
        let dir = tempfile::tempdir().unwrap();
        let first = Store::open_with_config(temp_config(&dir, 0)).unwrap();
        let second = Store::open_with_config(temp_config(&dir, 1)).unwrap();
        add_link(&first, "http://a.com");
        add_link(&second, "http://b.com");
        first.users().add("alice", "pw", false).unwrap();

        first.reset().unwrap();

        assert_eq!(first.links().count(&[]).unwrap(), 0);
        assert!(first.users().list_one("alice").unwrap().is_none());
        assert!(first.users().authenticate("admin", "password").unwrap());
        assert_eq!(second.links().count(&[]).unwrap(), 1);
    }

    #[test]
    fn test_explicit_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("links.db");
        let config = Config {
            database: Some(file.clone()),
            data_dir: PathBuf::from("/nonexistent"),
            ..Config::default()
        };

        let store = Store::open_with_config(config).unwrap();
        add_link(&store, "http://a.com");
        assert!(file.exists());
    }

    #[test]
    fn test_in_memory() {
        let store = Store::open_in_memory().unwrap();
        add_link(&store, "http://a.com");
        assert_eq!(store.links().count(&[]).unwrap(), 1);
    }
}
