//! Per-user reading lists
//!
//! Each user has a `saved` sorted set (link id → time saved) and a plain
//! `read` set. A link is still to read while it is saved and not read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::links::{temp_key, LinkRepository};
use crate::models::{Link, LinkId};
use crate::storage::{nth_reply, Aggregate, Batch, Combine, Command, KeyValueStore};

fn saved_key(user: &str) -> String {
    format!("reading-list:{}:saved", user)
}

fn read_key(user: &str) -> String {
    format!("reading-list:{}:read", user)
}

/// Save time as a score; never below the cut applied when listing
fn save_score(at: DateTime<Utc>) -> f64 {
    at.timestamp().max(1) as f64
}

fn check_user(user: &str) -> Result<()> {
    if user.trim().is_empty() {
        return Err(ValidationError::EmptyUsername.into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReadingListRepository {
    store: Arc<dyn KeyValueStore>,
    links: LinkRepository,
}

impl ReadingListRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let links = LinkRepository::new(store.clone());
        Self { store, links }
    }

    /// Save a link to the user's list, marking it unread
    pub fn add(&self, user: &str, id: &LinkId) -> Result<()> {
        self.add_at(user, id, Utc::now())
    }

    /// Save a link as if it had been saved at `at`
    pub fn add_at(&self, user: &str, id: &LinkId, at: DateTime<Utc>) -> Result<()> {
        check_user(user)?;
        let mut batch = Batch::new();
        batch
            .zadd(saved_key(user), id.as_str(), save_score(at))
            .srem(read_key(user), id.as_str());
        self.store.execute(&batch)?;
        debug!("{} saved {}", user, id);
        Ok(())
    }

    pub fn read(&self, user: &str, id: &LinkId) -> Result<()> {
        check_user(user)?;
        self.store
            .execute(&Batch::single(Command::SAdd {
                key: read_key(user),
                member: id.to_string(),
            }))?;
        Ok(())
    }

    pub fn unread(&self, user: &str, id: &LinkId) -> Result<()> {
        check_user(user)?;
        self.store
            .execute(&Batch::single(Command::SRem {
                key: read_key(user),
                member: id.to_string(),
            }))?;
        Ok(())
    }

    /// Drop a link from the user's list entirely
    pub fn remove(&self, user: &str, id: &LinkId) -> Result<()> {
        check_user(user)?;
        let mut batch = Batch::new();
        batch
            .zrem(saved_key(user), id.as_str())
            .srem(read_key(user), id.as_str());
        self.store.execute(&batch)?;
        debug!("{} removed {}", user, id);
        Ok(())
    }

    /// Saved links not yet read, most recently saved first
    pub fn to_read(&self, user: &str) -> Result<Vec<Link>> {
        // Read members score 0 and Min pulls them below the cut
        self.filtered(user, Combine::Union, Aggregate::Min)
    }

    /// Saved links already read, most recently saved first
    pub fn been_read(&self, user: &str) -> Result<Vec<Link>> {
        self.filtered(user, Combine::Intersection, Aggregate::Sum)
    }

    fn filtered(&self, user: &str, combine: Combine, aggregate: Aggregate) -> Result<Vec<Link>> {
        check_user(user)?;
        let tmp = temp_key();
        let sources = vec![(saved_key(user), 1.0), (read_key(user), 0.0)];

        let mut batch = Batch::new();
        batch.zstore(&tmp, sources, combine, aggregate);
        let range = batch.push(Command::ZRevRangeByScore {
            key: tmp.clone(),
            min: 1.0,
            max: f64::INFINITY,
        });
        batch.del(&tmp);

        let ids = nth_reply(self.store.execute(&batch)?, range, "ZREVRANGEBYSCORE")?
            .into_members("ZREVRANGEBYSCORE")?;
        self.links.hydrate(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLink;
    use crate::storage::SqliteStore;
    use chrono::{Duration, TimeZone};

    fn setup() -> (Arc<SqliteStore>, LinkRepository, ReadingListRepository) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let links = LinkRepository::new(store.clone());
        let list = ReadingListRepository::new(store.clone());
        (store, links, list)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn add_link(links: &LinkRepository, url: &str) -> LinkId {
        links
            .add(NewLink::new("T", "D", url, "admin", vec!["t".to_string()]).created_at(at(0)))
            .unwrap()
    }

    fn urls(links: &[Link]) -> Vec<&str> {
        links.iter().map(|l| l.url.as_str()).collect()
    }

    #[test]
    fn test_saved_minus_read() {
        let (store, links, list) = setup();
        let a = add_link(&links, "http://a.com");
        let b = add_link(&links, "http://b.com");
        let c = add_link(&links, "http://c.com");

        list.add_at("u", &a, at(1)).unwrap();
        list.add_at("u", &b, at(2)).unwrap();
        list.add_at("u", &c, at(3)).unwrap();
        list.read("u", &b).unwrap();

        assert_eq!(
            urls(&list.to_read("u").unwrap()),
            vec!["http://c.com", "http://a.com"]
        );
        assert_eq!(urls(&list.been_read("u").unwrap()), vec!["http://b.com"]);
        assert!(store.keys("tmp:").unwrap().is_empty());
    }

    #[test]
    fn test_unread_returns_link_to_list() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");

        list.add_at("u", &a, at(1)).unwrap();
        list.read("u", &a).unwrap();
        assert!(list.to_read("u").unwrap().is_empty());

        list.unread("u", &a).unwrap();
        assert_eq!(urls(&list.to_read("u").unwrap()), vec!["http://a.com"]);
        assert!(list.been_read("u").unwrap().is_empty());
    }

    #[test]
    fn test_resave_marks_unread() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");

        list.add_at("u", &a, at(1)).unwrap();
        list.read("u", &a).unwrap();
        list.add_at("u", &a, at(5)).unwrap();

        assert_eq!(urls(&list.to_read("u").unwrap()), vec!["http://a.com"]);
    }

    #[test]
    fn test_read_without_saving_is_not_listed() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");

        list.read("u", &a).unwrap();

        assert!(list.to_read("u").unwrap().is_empty());
        assert!(list.been_read("u").unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let (store, links, list) = setup();
        let a = add_link(&links, "http://a.com");
        list.add_at("u", &a, at(1)).unwrap();
        list.read("u", &a).unwrap();

        list.remove("u", &a).unwrap();

        assert!(list.to_read("u").unwrap().is_empty());
        assert!(list.been_read("u").unwrap().is_empty());
        assert!(!store.exists("reading-list:u:saved").unwrap());
        assert!(!store.exists("reading-list:u:read").unwrap());
    }

    #[test]
    fn test_lists_are_per_user() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");

        list.add_at("alice", &a, at(1)).unwrap();

        assert_eq!(list.to_read("alice").unwrap().len(), 1);
        assert!(list.to_read("bob").unwrap().is_empty());
    }

    #[test]
    fn test_deleted_link_is_skipped() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");
        let b = add_link(&links, "http://b.com");
        list.add_at("u", &a, at(1)).unwrap();
        list.add_at("u", &b, at(2)).unwrap();

        links.delete(&b).unwrap();

        assert_eq!(urls(&list.to_read("u").unwrap()), vec!["http://a.com"]);
    }

    #[test]
    fn test_old_saves_are_listed() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");
        let b = add_link(&links, "http://b.com");
        let c = add_link(&links, "http://c.com");

        list.add_at("u", &a, Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap())
            .unwrap();
        list.add_at("u", &b, Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        list.add_at("u", &c, Utc.with_ymd_and_hms(1969, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        list.read("u", &b).unwrap();

        assert_eq!(
            urls(&list.to_read("u").unwrap()),
            vec!["http://a.com", "http://c.com"]
        );
        assert_eq!(urls(&list.been_read("u").unwrap()), vec!["http://b.com"]);
    }

    #[test]
    fn test_empty_user_rejected() {
        let (_store, links, list) = setup();
        let a = add_link(&links, "http://a.com");

        assert!(list.add("", &a).unwrap_err().is_validation());
        assert!(list.to_read("  ").unwrap_err().is_validation());
    }
}
