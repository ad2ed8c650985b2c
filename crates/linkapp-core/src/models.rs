//! Data models for linkapp
//!
//! Defines links, their flat string record form, link inputs and updates,
//! and users, plus the tag normalisation and recency scoring rules shared
//! by every repository.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::storage::{StorageError, StorageResult};

/// Separator used when tags are stored as one string
pub const TAG_DELIMITER: char = '|';

/// Text pattern of the `created` field (UTC, minute precision)
pub const CREATED_FORMAT: &str = "%m-%d-%Y @ %H:%M";

/// Reference instant for recency scores: 2017-01-01T00:00:00Z
pub const EPOCH_TIMESTAMP: i64 = 1_483_228_800;

/// Seconds between the reference epoch and `at`
pub fn recency_score(at: DateTime<Utc>) -> f64 {
    (at.timestamp() - EPOCH_TIMESTAMP) as f64
}

/// Trim, drop blanks, deduplicate and sort tags
///
/// Fails if nothing is left or a tag contains [`TAG_DELIMITER`].
pub fn normalize_tags<I, S>(tags: I) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if tag.contains(TAG_DELIMITER) {
            return Err(ValidationError::TagContainsDelimiter(tag.to_string()));
        }
        normalized.insert(tag.to_string());
    }

    if normalized.is_empty() {
        return Err(ValidationError::EmptyTags);
    }
    Ok(normalized.into_iter().collect())
}

/// Content-derived link identifier
///
/// The first 128 bits of the SHA-256 of the URL, as 32 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    /// Derive the id a URL is stored under
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(hex::encode(&digest[..16]))
    }

    /// Wrap an id string received from a caller
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LinkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A saved link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Hash of `url`
    pub id: LinkId,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Username of whoever saved the link
    pub author: String,
    /// Creation time, minute precision once stored
    pub created_at: DateTime<Utc>,
    /// Normalised, sorted, never empty
    pub tags: Vec<String>,
}

impl Link {
    /// Tags joined with [`TAG_DELIMITER`]
    pub fn joined_tags(&self) -> String {
        join_tags(&self.tags)
    }
}

pub(crate) fn join_tags(tags: &[String]) -> String {
    tags.join(&TAG_DELIMITER.to_string())
}

/// Input for adding a link
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub title: String,
    pub description: String,
    pub url: String,
    pub author: String,
    pub tags: Vec<String>,
    /// Defaults to now
    pub created_at: Option<DateTime<Utc>>,
}

impl NewLink {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        author: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            author: author.into(),
            tags,
            created_at: None,
        }
    }

    /// Backdate the link (restores, imports)
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// Partial update of a link; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LinkUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.url.is_none()
            && self.author.is_none()
            && self.tags.is_none()
            && self.created_at.is_none()
    }
}

/// Flat string form of a link, as stored and as handed to presentation code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub page_title: String,
    pub desc_text: String,
    pub url_address: String,
    pub key: String,
    pub author: String,
    /// [`CREATED_FORMAT`]
    pub created: String,
    /// Tags joined with [`TAG_DELIMITER`]
    pub tags: String,
}

impl LinkRecord {
    const FIELDS: [&'static str; 7] = [
        "page_title",
        "desc_text",
        "url_address",
        "key",
        "author",
        "created",
        "tags",
    ];

    /// Split the stored tag string
    pub fn tag_list(&self) -> Vec<&str> {
        if self.tags.is_empty() {
            return Vec::new();
        }
        self.tags.split(TAG_DELIMITER).collect()
    }

    /// Parse the `created` field
    pub fn created_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        NaiveDateTime::parse_from_str(&self.created, CREATED_FORMAT).map(|dt| dt.and_utc())
    }

    /// Field/value pairs for a hash write
    pub fn into_fields(self) -> Vec<(String, String)> {
        vec![
            ("page_title".to_string(), self.page_title),
            ("desc_text".to_string(), self.desc_text),
            ("url_address".to_string(), self.url_address),
            ("key".to_string(), self.key),
            ("author".to_string(), self.author),
            ("created".to_string(), self.created),
            ("tags".to_string(), self.tags),
        ]
    }

    /// Rebuild a record from a hash read from `key`
    pub fn from_fields(key: &str, mut fields: HashMap<String, String>) -> StorageResult<Self> {
        if let Some(missing) = Self::FIELDS.iter().find(|f| !fields.contains_key(**f)) {
            return Err(StorageError::CorruptRecord {
                key: key.to_string(),
                details: format!("missing field '{}'", missing),
            });
        }

        let mut take = |field: &str| fields.remove(field).unwrap_or_default();
        Ok(Self {
            page_title: take("page_title"),
            desc_text: take("desc_text"),
            url_address: take("url_address"),
            key: take("key"),
            author: take("author"),
            created: take("created"),
            tags: take("tags"),
        })
    }
}

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        Self {
            page_title: link.title.clone(),
            desc_text: link.description.clone(),
            url_address: link.url.clone(),
            key: link.id.to_string(),
            author: link.author.clone(),
            created: link.created_at.format(CREATED_FORMAT).to_string(),
            tags: link.joined_tags(),
        }
    }
}

impl TryFrom<LinkRecord> for Link {
    type Error = StorageError;

    fn try_from(record: LinkRecord) -> Result<Self, Self::Error> {
        let created_at = record
            .created_at()
            .map_err(|e| StorageError::CorruptRecord {
                key: format!("link:{}", record.key),
                details: format!("bad created '{}': {}", record.created, e),
            })?;
        let tags = record.tag_list().into_iter().map(str::to_string).collect();

        Ok(Link {
            id: LinkId(record.key),
            title: record.page_title,
            description: record.desc_text,
            url: record.url_address,
            author: record.author,
            created_at,
            tags,
        })
    }
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// PHC-format password hash
    #[serde(rename = "password")]
    pub password_hash: String,
}
