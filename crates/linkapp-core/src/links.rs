//! Link repository
//!
//! Stores each link as a hash under `link:<id>` and keeps two kinds of
//! sorted-set index in step with it:
//!
//! - `tag:<tag>`: every link carrying the tag, scored by recency
//! - `links`: every link, scored by recency
//!
//! Every mutation is one [`Batch`], so a record and its index entries are
//! never observed out of step. Read-then-write operations guard the
//! record's `tags` field with a watch; a concurrent change to it makes the
//! batch fail with [`StorageError::WatchConflict`](crate::storage::StorageError)
//! instead of leaving stale index entries behind.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result, ValidationError};
use crate::models::{
    join_tags, normalize_tags, recency_score, Link, LinkId, LinkRecord, LinkUpdate, NewLink,
    CREATED_FORMAT, TAG_DELIMITER,
};
use crate::storage::{nth_reply, Aggregate, Batch, Combine, Command, KeyValueStore};

/// Sorted set holding every link id
pub const GLOBAL_INDEX: &str = "links";

pub(crate) fn record_key(id: &str) -> String {
    format!("link:{}", id)
}

fn tag_key(tag: &str) -> String {
    format!("tag:{}", tag)
}

/// Unique key for a transient aggregation result
pub(crate) fn temp_key() -> String {
    format!("tmp:{}", Uuid::new_v4())
}

fn split_tags(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(TAG_DELIMITER).map(str::to_string).collect()
}

/// Trim and deduplicate tags used as a query filter
///
/// An empty filter means every link; a filter of only blank tags is rejected.
fn query_tags(tags: &[String]) -> Result<Vec<String>> {
    let filter: Vec<String> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if filter.is_empty() && !tags.is_empty() {
        return Err(ValidationError::EmptyTags.into());
    }
    Ok(filter)
}

/// Queue the record hash, its tag entries and its global entry
fn write_link(batch: &mut Batch, link: &Link, score: f64) {
    let id = link.id.as_str();
    batch.hset(record_key(id), LinkRecord::from(link).into_fields());
    for tag in &link.tags {
        batch.zadd(tag_key(tag), id, score);
    }
    batch.zadd(GLOBAL_INDEX, id, score);
}

/// Tag-indexed, recency-ordered link storage
#[derive(Clone)]
pub struct LinkRepository {
    store: Arc<dyn KeyValueStore>,
}

impl LinkRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Add a link, returning its id
    ///
    /// Adding a URL that is already stored overwrites that link.
    pub fn add(&self, link: NewLink) -> Result<LinkId> {
        let tags = normalize_tags(&link.tags)?;
        let created_at = link.created_at.unwrap_or_else(Utc::now);
        let id = LinkId::from_url(&link.url);
        let key = record_key(id.as_str());

        let previous = self.store.hget(&key, "tags")?;
        let stale: Vec<String> = previous
            .as_deref()
            .map(split_tags)
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !tags.contains(t))
            .collect();

        let record = Link {
            id: id.clone(),
            title: link.title,
            description: link.description,
            url: link.url,
            author: link.author,
            created_at,
            tags,
        };

        let mut batch = Batch::new();
        batch.watch(&key, "tags", previous);
        for tag in &stale {
            batch.zrem(tag_key(tag), id.as_str());
        }
        write_link(&mut batch, &record, recency_score(created_at));
        self.store.execute(&batch)?;

        debug!("Added link {} with {} tag(s)", id, record.tags.len());
        Ok(id)
    }

    /// Delete a link and every index entry pointing at it
    ///
    /// Deleting a missing link is a no-op.
    pub fn delete(&self, id: &LinkId) -> Result<()> {
        let key = record_key(id.as_str());
        let tags = self.store.hget(&key, "tags")?;

        let mut batch = Batch::new();
        batch.watch(&key, "tags", tags.clone());
        for tag in tags.as_deref().map(split_tags).unwrap_or_default() {
            batch.zrem(tag_key(&tag), id.as_str());
        }
        batch.zrem(GLOBAL_INDEX, id.as_str()).del(&key);
        self.store.execute(&batch)?;

        debug!("Deleted link {}", id);
        Ok(())
    }

    /// Apply a partial update, returning the link's id afterwards
    ///
    /// A new URL that hashes to a different id moves the whole link (record
    /// and index entries) to that id in one batch. Re-tagging keeps the
    /// link's recency score; changing `created_at` recomputes it.
    pub fn modify(&self, id: &LinkId, update: LinkUpdate) -> Result<LinkId> {
        let new_tags = update.tags.as_ref().map(normalize_tags).transpose()?;

        let current = self.list_one(id)?.ok_or_else(|| Error::NotFound {
            kind: "Link",
            id: id.to_string(),
        })?;
        if update.is_empty() {
            return Ok(id.clone());
        }

        let key = record_key(id.as_str());
        let score = match update.created_at {
            Some(at) => recency_score(at),
            None => self
                .store
                .zscore(GLOBAL_INDEX, id.as_str())?
                .unwrap_or_else(|| recency_score(current.created_at)),
        };

        let mut batch = Batch::new();
        batch.watch(&key, "tags", Some(current.joined_tags()));

        let target = update.url.as_deref().map(LinkId::from_url);
        let new_id = match target {
            Some(target) if target != *id => {
                let merged = Link {
                    id: target.clone(),
                    title: update.title.unwrap_or_else(|| current.title.clone()),
                    description: update
                        .description
                        .unwrap_or_else(|| current.description.clone()),
                    url: update.url.unwrap_or_else(|| current.url.clone()),
                    author: update.author.unwrap_or_else(|| current.author.clone()),
                    created_at: update.created_at.unwrap_or(current.created_at),
                    tags: new_tags.unwrap_or_else(|| current.tags.clone()),
                };
                self.queue_rename(&mut batch, &current, &merged, score)?;
                debug!("Renaming link {} to {}", id, target);
                target
            }
            _ => {
                queue_in_place(&mut batch, &current, update, new_tags, score);
                id.clone()
            }
        };

        self.store.execute(&batch)?;
        Ok(new_id)
    }

    /// Delete `current` and recreate it as `merged` in the same batch
    fn queue_rename(
        &self,
        batch: &mut Batch,
        current: &Link,
        merged: &Link,
        score: f64,
    ) -> Result<()> {
        let old_id = current.id.as_str();
        for tag in &current.tags {
            batch.zrem(tag_key(tag), old_id);
        }
        batch
            .zrem(GLOBAL_INDEX, old_id)
            .del(record_key(old_id));

        // Another link may already live under the new id
        let target_key = record_key(merged.id.as_str());
        let target_tags = self.store.hget(&target_key, "tags")?;
        batch.watch(&target_key, "tags", target_tags.clone());
        for tag in target_tags.as_deref().map(split_tags).unwrap_or_default() {
            batch.zrem(tag_key(&tag), merged.id.as_str());
        }
        batch.del(&target_key);

        write_link(batch, merged, score);
        Ok(())
    }

    /// Get one link
    pub fn list_one(&self, id: &LinkId) -> Result<Option<Link>> {
        let key = record_key(id.as_str());
        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        let record = LinkRecord::from_fields(&key, fields)?;
        Ok(Some(Link::try_from(record)?))
    }

    /// Get one link in its flat string form
    pub fn record(&self, id: &LinkId) -> Result<Option<LinkRecord>> {
        let key = record_key(id.as_str());
        let fields = self.store.hgetall(&key)?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(LinkRecord::from_fields(&key, fields)?))
    }

    /// Links carrying every tag in `tags`, most recent first
    ///
    /// `start` and `stop` are inclusive 0-based ranks; negative values count
    /// from the end. No tags means every link; only blank tags is an error.
    pub fn list(&self, tags: &[String], start: i64, stop: i64) -> Result<Vec<Link>> {
        let tags = query_tags(tags)?;
        let ids = match tags.as_slice() {
            [] => self.store.zrevrange(GLOBAL_INDEX, start, stop)?,
            [tag] => self.store.zrevrange(&tag_key(tag), start, stop)?,
            _ => {
                let tmp = temp_key();
                let mut batch = Batch::new();
                batch.zstore(&tmp, intersection_sources(&tags), Combine::Intersection, Aggregate::Max);
                let range = batch.push(Command::ZRevRange {
                    key: tmp.clone(),
                    start,
                    stop,
                });
                batch.del(&tmp);
                nth_reply(self.store.execute(&batch)?, range, "ZREVRANGE")?
                    .into_scored("ZREVRANGE")?
            }
        };

        let ids: Vec<String> = ids.into_iter().map(|m| m.member).collect();
        self.hydrate(&ids)
    }

    /// Every link, most recent first
    pub fn listing(&self) -> Result<Vec<Link>> {
        self.list(&[], 0, -1)
    }

    /// Number of links carrying every tag in `tags`
    pub fn count(&self, tags: &[String]) -> Result<u64> {
        let tags = query_tags(tags)?;
        match tags.as_slice() {
            [] => Ok(self.store.zcard(GLOBAL_INDEX)?),
            [tag] => Ok(self.store.zcard(&tag_key(tag))?),
            _ => {
                let tmp = temp_key();
                let mut batch = Batch::new();
                batch
                    .zstore(&tmp, intersection_sources(&tags), Combine::Intersection, Aggregate::Max)
                    .del(&tmp);
                let count = nth_reply(self.store.execute(&batch)?, 0, "ZSTORE")?
                    .into_int("ZSTORE")?;
                Ok(count.max(0) as u64)
            }
        }
    }

    /// Every tag in use with its number of links, most used first
    pub fn tag_counts(&self) -> Result<Vec<(String, u64)>> {
        let keys = self.store.keys("tag:")?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Batch::new();
        for key in &keys {
            batch.zcard(key.as_str());
        }
        let replies = self.store.execute(&batch)?;

        let mut counts = Vec::with_capacity(keys.len());
        for (key, reply) in keys.iter().zip(replies) {
            let count = reply.into_int("ZCARD")?;
            let tag = key.strip_prefix("tag:").unwrap_or(key);
            counts.push((tag.to_string(), count.max(0) as u64));
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    pub fn exists(&self, id: &LinkId) -> Result<bool> {
        Ok(self.store.exists(&record_key(id.as_str()))?)
    }

    /// Whether a link with this URL is already stored
    pub fn url_exists(&self, url: &str) -> Result<bool> {
        self.exists(&LinkId::from_url(url))
    }

    /// Whether `url` would move the link stored under `id` to another id
    pub fn url_changed(&self, id: &LinkId, url: &str) -> bool {
        LinkId::from_url(url) != *id
    }

    /// Load links for `ids` in one pipelined batch, keeping order
    ///
    /// Ids whose record no longer exists are skipped.
    pub(crate) fn hydrate(&self, ids: &[String]) -> Result<Vec<Link>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Batch::new();
        for id in ids {
            batch.hgetall(record_key(id));
        }
        let replies = self.store.execute(&batch)?;

        let mut links = Vec::with_capacity(ids.len());
        for (id, reply) in ids.iter().zip(replies) {
            let fields = reply.into_hash("HGETALL")?;
            if fields.is_empty() {
                warn!("Index references missing link {}", id);
                continue;
            }
            let record = LinkRecord::from_fields(&record_key(id), fields)?;
            links.push(Link::try_from(record)?);
        }
        Ok(links)
    }
}

fn intersection_sources(tags: &[String]) -> Vec<(String, f64)> {
    tags.iter().map(|t| (tag_key(t), 1.0)).collect()
}

/// Queue the writes of an update that keeps the link's id
fn queue_in_place(
    batch: &mut Batch,
    current: &Link,
    update: LinkUpdate,
    new_tags: Option<Vec<String>>,
    score: f64,
) {
    let id = current.id.as_str();
    let mut fields = Vec::new();
    if let Some(title) = update.title {
        fields.push(("page_title".to_string(), title));
    }
    if let Some(description) = update.description {
        fields.push(("desc_text".to_string(), description));
    }
    if let Some(url) = update.url {
        fields.push(("url_address".to_string(), url));
    }
    if let Some(author) = update.author {
        fields.push(("author".to_string(), author));
    }
    if let Some(at) = update.created_at {
        fields.push(("created".to_string(), at.format(CREATED_FORMAT).to_string()));
    }
    if let Some(tags) = &new_tags {
        fields.push(("tags".to_string(), join_tags(tags)));
    }
    if !fields.is_empty() {
        batch.hset(record_key(id), fields);
    }

    let rescored = update.created_at.is_some();
    if let Some(tags) = &new_tags {
        let keep: HashSet<&String> = tags.iter().collect();
        for old in current.tags.iter().filter(|t| !keep.contains(t)) {
            batch.zrem(tag_key(old), id);
        }
    }
    if new_tags.is_some() || rescored {
        for tag in new_tags.as_ref().unwrap_or(&current.tags) {
            batch.zadd(tag_key(tag), id, score);
        }
    }
    if rescored {
        batch.zadd(GLOBAL_INDEX, id, score);
    }
}
