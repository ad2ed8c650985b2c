//! JSON backups
//!
//! A backup is `{"users": [...], "links": [...]}` with links in their flat
//! [`LinkRecord`] form. Restoring replays every record through the
//! repositories, so indices are rebuilt rather than copied.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::links::LinkRepository;
use crate::models::{normalize_tags, LinkRecord, NewLink, User};
use crate::users::UserRepository;

/// Default backup file name
pub const DEFAULT_BACKUP_FILE: &str = "data_backup.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// What a restore wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreStats {
    pub links: usize,
    pub users: usize,
}

impl Backup {
    /// Snapshot every link (most recent first) and every user
    pub fn capture(links: &LinkRepository, users: &UserRepository) -> Result<Self> {
        let links = links
            .listing()?
            .iter()
            .map(LinkRecord::from)
            .collect();
        Ok(Self {
            users: users.listing()?,
            links,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Backup(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Backup(e.to_string()))
    }

    /// Replay the backup into the given repositories
    ///
    /// Every link record is checked before anything is written.
    pub fn restore(&self, links: &LinkRepository, users: &UserRepository) -> Result<RestoreStats> {
        let mut pending = Vec::with_capacity(self.links.len());
        for record in &self.links {
            let created_at = record.created_at().map_err(|e| {
                Error::Backup(format!(
                    "link {} has unreadable created '{}': {}",
                    record.url_address, record.created, e
                ))
            })?;
            let tags = normalize_tags(record.tag_list()).map_err(|e| {
                Error::Backup(format!(
                    "link {} has unusable tags '{}': {}",
                    record.url_address, record.tags, e
                ))
            })?;
            pending.push(
                NewLink::new(
                    record.page_title.clone(),
                    record.desc_text.clone(),
                    record.url_address.clone(),
                    record.author.clone(),
                    tags,
                )
                .created_at(created_at),
            );
        }

        let mut stats = RestoreStats::default();
        for link in pending {
            links.add(link)?;
            stats.links += 1;
        }
        for user in &self.users {
            users.add(&user.username, &user.password_hash, true)?;
            stats.users += 1;
        }

        info!("Restored {} link(s) and {} user(s)", stats.links, stats.users);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Link;
    use crate::storage::SqliteStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn repos() -> (LinkRepository, UserRepository) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        (LinkRepository::new(store.clone()), UserRepository::new(store))
    }

    fn seed(links: &LinkRepository, users: &UserRepository) {
        links
            .add(
                NewLink::new(
                    "Words In The Title",
                    "The little brown fox jumps over the fence.",
                    "http://www.thisisnotaurl.com",
                    "Hubert",
                    vec!["fooa".to_string(), "foob".to_string()],
                )
                .created_at(Utc.with_ymd_and_hms(2017, 1, 15, 9, 30, 0).unwrap()),
            )
            .unwrap();
        links
            .add(
                NewLink::new("Other", "Second", "http://other.com", "admin", vec!["foob".to_string()])
                    .created_at(Utc.with_ymd_and_hms(2018, 3, 2, 0, 0, 0).unwrap()),
            )
            .unwrap();
        users.add("admin", "password", false).unwrap();
    }

    #[test]
    fn test_backup_then_restore_reproduces_data() {
        let (links, users) = repos();
        seed(&links, &users);

        let json = Backup::capture(&links, &users).unwrap().to_json().unwrap();

        let (fresh_links, fresh_users) = repos();
        let stats = Backup::from_json(&json)
            .unwrap()
            .restore(&fresh_links, &fresh_users)
            .unwrap();

        assert_eq!(stats, RestoreStats { links: 2, users: 1 });
        let before: Vec<Link> = links.listing().unwrap();
        let after: Vec<Link> = fresh_links.listing().unwrap();
        assert_eq!(before, after);
        assert_eq!(fresh_links.count(&["foob".to_string()]).unwrap(), 2);
        assert!(fresh_users.authenticate("admin", "password").unwrap());
    }

    #[test]
    fn test_json_shape() {
        let (links, users) = repos();
        seed(&links, &users);

        let json = Backup::capture(&links, &users).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["users"][0]["username"], "admin");
        assert!(value["users"][0]["password"].is_string());
        assert_eq!(value["links"][0]["url_address"], "http://other.com");
        assert_eq!(value["links"][1]["created"], "01-15-2017 @ 09:30");
        assert_eq!(value["links"][1]["tags"], "fooa|foob");
    }

    #[test]
    fn test_bad_created_restores_nothing() {
        let json = r#"{
            "users": [],
            "links": [
                {"page_title": "A", "desc_text": "a", "url_address": "http://a.com",
                 "key": "", "author": "x", "created": "01-01-2018 @ 10:00", "tags": "t"},
                {"page_title": "B", "desc_text": "b", "url_address": "http://b.com",
                 "key": "", "author": "x", "created": "last tuesday", "tags": "t"}
            ]
        }"#;
        let (links, users) = repos();

        let err = Backup::from_json(json)
            .unwrap()
            .restore(&links, &users)
            .unwrap_err();

        assert!(matches!(err, Error::Backup(_)));
        assert_eq!(links.count(&[]).unwrap(), 0);
    }

    #[test]
    fn test_bad_tags_restore_nothing() {
        let (links, users) = repos();
        for tags in ["", " ", " | "] {
            let json = format!(
                r#"{{
                    "users": [{{"username": "admin", "password": "x"}}],
                    "links": [
                        {{"page_title": "A", "desc_text": "a", "url_address": "http://a.com",
                         "key": "", "author": "x", "created": "01-01-2018 @ 10:00", "tags": "t"}},
                        {{"page_title": "B", "desc_text": "b", "url_address": "http://b.com",
                         "key": "", "author": "x", "created": "01-02-2018 @ 10:00", "tags": "{}"}}
                    ]
                }}"#,
                tags
            );

            let err = Backup::from_json(&json)
                .unwrap()
                .restore(&links, &users)
                .unwrap_err();

            assert!(matches!(err, Error::Backup(_)), "tags {:?}", tags);
            assert_eq!(links.count(&[]).unwrap(), 0);
            assert!(users.listing().unwrap().is_empty());
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Backup::from_json("{not json"), Err(Error::Backup(_))));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let backup = Backup::from_json("{}").unwrap();
        assert!(backup.users.is_empty());
        assert!(backup.links.is_empty());
    }
}
