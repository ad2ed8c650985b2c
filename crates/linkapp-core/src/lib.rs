//! linkapp Core Library
//!
//! This crate provides the data-access layer of linkapp, a shared
//! bookmark collection: tag-indexed links ordered by recency, per-user
//! reading lists and user accounts, all kept in a key-value store.
//!
//! # Architecture
//!
//! - **Key-value engine**: hashes, sets and sorted sets mutated through
//!   atomic batches ([`storage`]), backed by SQLite
//! - **Repositories**: links, reading lists and users on top of the engine
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//!
//! // Add a link
//! let id = store.links().add(NewLink::new(
//!     "Example", "An example", "https://example.com", "admin",
//!     vec!["rust".into(), "web".into()],
//! ))?;
//!
//! // Query links carrying both tags, first page
//! let links = store.links().list(&["rust".into(), "web".into()], 0, 9)?;
//! ```
//!
//! # Modules
//!
//! - `store`: Opens the engine and hands out repositories (main entry point)
//! - `links`: Link records and their tag / recency indices
//! - `reading_list`: Per-user saved and read links
//! - `users`: Accounts and password checks
//! - `models`: Data structures for links and users
//! - `backup`: JSON dump and restore
//! - `pagination`: Page number arithmetic
//! - `storage`: Key-value store trait and the SQLite engine
//! - `config`: Application configuration

pub mod backup;
pub mod config;
pub mod error;
pub mod links;
pub mod models;
pub mod pagination;
pub mod reading_list;
pub mod storage;
pub mod store;
pub mod users;

pub use backup::{Backup, RestoreStats, DEFAULT_BACKUP_FILE};
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use links::LinkRepository;
pub use models::{Link, LinkId, LinkRecord, LinkUpdate, NewLink, User};
pub use pagination::{PageInfo, PageRequest};
pub use reading_list::ReadingListRepository;
pub use storage::{KeyValueStore, SqliteStore, StorageError};
pub use store::Store;
pub use users::UserRepository;
