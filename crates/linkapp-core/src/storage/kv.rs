//! Key-value store abstraction
//!
//! Models a store with three kinds of values under string keys:
//!
//! - **hashes**: field → value records
//! - **sets**: unordered member collections
//! - **sorted sets**: member → score collections, ordered by score
//!
//! Every interaction is a [`Batch`]: an ordered list of [`Command`]s plus
//! optional watch guards, applied by [`KeyValueStore::execute`] as a single
//! all-or-nothing unit. Each execution returns its own `Vec<Reply>`, one
//! reply per command, in command order.

use std::collections::HashMap;

use super::error::{StorageError, StorageResult};

/// How a [`Command::ZStore`] picks members from its sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Keep members present in every source
    Intersection,
    /// Keep members present in any source
    Union,
}

/// How a [`Command::ZStore`] folds the weighted scores of one member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub(crate) fn fold(self, acc: f64, score: f64) -> f64 {
        match self {
            Aggregate::Sum => acc + score,
            Aggregate::Min => acc.min(score),
            Aggregate::Max => acc.max(score),
        }
    }
}

/// A single store operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set the given fields of a hash, creating it if needed
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Read every field of a hash (empty map if absent)
    HGetAll { key: String },
    /// Read one field of a hash
    HGet { key: String, field: String },
    /// Delete a key of any kind
    Del { key: String },
    /// Check whether a key of any kind exists
    Exists { key: String },
    /// List keys of any kind starting with `prefix`, sorted
    Keys { prefix: String },
    /// Insert or re-score a sorted-set member
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    /// Remove a sorted-set member
    ZRem { key: String, member: String },
    /// Score of a sorted-set member
    ZScore { key: String, member: String },
    /// Number of members in a sorted set
    ZCard { key: String },
    /// Members by inclusive rank range, highest score first
    ZRevRange { key: String, start: i64, stop: i64 },
    /// Members with `min <= score <= max`, highest score first
    ZRevRangeByScore { key: String, min: f64, max: f64 },
    /// Combine weighted sources into `dest`, replacing it
    ///
    /// Plain sets take part with an implicit score of 1.
    ZStore {
        dest: String,
        sources: Vec<(String, f64)>,
        combine: Combine,
        aggregate: Aggregate,
    },
    /// Add a plain-set member
    SAdd { key: String, member: String },
    /// Remove a plain-set member
    SRem { key: String, member: String },
    /// Every member of a plain set, sorted
    SMembers { key: String },
    /// Remove every key in the current logical database
    FlushDb,
}

impl Command {
    /// Upper-case command name, used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::HSet { .. } => "HSET",
            Command::HGetAll { .. } => "HGETALL",
            Command::HGet { .. } => "HGET",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Keys { .. } => "KEYS",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZCard { .. } => "ZCARD",
            Command::ZRevRange { .. } => "ZREVRANGE",
            Command::ZRevRangeByScore { .. } => "ZREVRANGEBYSCORE",
            Command::ZStore { .. } => "ZSTORE",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SMembers { .. } => "SMEMBERS",
            Command::FlushDb => "FLUSHDB",
        }
    }
}

/// A sorted-set member together with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// The result of one [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Write acknowledged
    Ok,
    /// Integer result: counts, cardinalities, 0/1 booleans
    Int(i64),
    /// Optional scalar value (HGET)
    Value(Option<String>),
    /// Optional score (ZSCORE)
    Score(Option<f64>),
    /// Full hash contents
    Hash(HashMap<String, String>),
    /// Keys or plain-set members
    Members(Vec<String>),
    /// Sorted-set members with scores, in range order
    Scored(Vec<ScoredMember>),
}

impl Reply {
    fn mismatch(command: &'static str, expected: &'static str) -> StorageError {
        StorageError::UnexpectedReply { command, expected }
    }

    pub fn into_int(self, command: &'static str) -> StorageResult<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            _ => Err(Self::mismatch(command, "integer")),
        }
    }

    pub fn into_bool(self, command: &'static str) -> StorageResult<bool> {
        self.into_int(command).map(|n| n != 0)
    }

    pub fn into_value(self, command: &'static str) -> StorageResult<Option<String>> {
        match self {
            Reply::Value(v) => Ok(v),
            _ => Err(Self::mismatch(command, "value")),
        }
    }

    pub fn into_score(self, command: &'static str) -> StorageResult<Option<f64>> {
        match self {
            Reply::Score(s) => Ok(s),
            _ => Err(Self::mismatch(command, "score")),
        }
    }

    pub fn into_hash(self, command: &'static str) -> StorageResult<HashMap<String, String>> {
        match self {
            Reply::Hash(h) => Ok(h),
            _ => Err(Self::mismatch(command, "hash")),
        }
    }

    pub fn into_members(self, command: &'static str) -> StorageResult<Vec<String>> {
        match self {
            Reply::Members(m) => Ok(m),
            Reply::Scored(s) => Ok(s.into_iter().map(|m| m.member).collect()),
            _ => Err(Self::mismatch(command, "member list")),
        }
    }

    pub fn into_scored(self, command: &'static str) -> StorageResult<Vec<ScoredMember>> {
        match self {
            Reply::Scored(s) => Ok(s),
            _ => Err(Self::mismatch(command, "scored member list")),
        }
    }
}

/// Precondition checked before a batch is applied
///
/// The batch is discarded unless `field` of hash `key` currently holds
/// `expected` (`None` meaning the field is absent).
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub key: String,
    pub field: String,
    pub expected: Option<String>,
}

/// An ordered group of commands applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    watches: Vec<Watch>,
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch holding one command
    pub fn single(command: Command) -> Self {
        Self {
            watches: Vec::new(),
            commands: vec![command],
        }
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append a command, returning its reply index
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub fn watch(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        expected: Option<String>,
    ) -> &mut Self {
        self.watches.push(Watch {
            key: key.into(),
            field: field.into(),
            expected,
        });
        self
    }

    pub fn hset(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            fields,
        });
        self
    }

    pub fn hgetall(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::HGetAll { key: key.into() });
        self
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Del { key: key.into() });
        self
    }

    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.push(Command::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::ZRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn zcard(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::ZCard { key: key.into() });
        self
    }

    pub fn zrevrange(&mut self, key: impl Into<String>, start: i64, stop: i64) -> &mut Self {
        self.push(Command::ZRevRange {
            key: key.into(),
            start,
            stop,
        });
        self
    }

    pub fn zrevrangebyscore(&mut self, key: impl Into<String>, min: f64, max: f64) -> &mut Self {
        self.push(Command::ZRevRangeByScore {
            key: key.into(),
            min,
            max,
        });
        self
    }

    pub fn zstore(
        &mut self,
        dest: impl Into<String>,
        sources: Vec<(String, f64)>,
        combine: Combine,
        aggregate: Aggregate,
    ) -> &mut Self {
        self.push(Command::ZStore {
            dest: dest.into(),
            sources,
            combine,
            aggregate,
        });
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }
}

/// A key-value engine with hashes, sets, sorted sets and atomic batches
///
/// Implementations must apply each batch as one unit: either every watch
/// holds and every command is applied, or nothing is.
pub trait KeyValueStore: Send + Sync {
    /// Apply a batch, returning one reply per command
    fn execute(&self, batch: &Batch) -> StorageResult<Vec<Reply>>;

    /// Run a single command and return its reply
    fn query(&self, command: Command) -> StorageResult<Reply> {
        let name = command.name();
        self.execute(&Batch::single(command))?
            .pop()
            .ok_or(StorageError::UnexpectedReply {
                command: name,
                expected: "one reply",
            })
    }

    fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.query(Command::HGetAll { key: key.to_string() })?
            .into_hash("HGETALL")
    }

    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.query(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })?
        .into_value("HGET")
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.query(Command::Exists { key: key.to_string() })?
            .into_bool("EXISTS")
    }

    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.query(Command::Keys {
            prefix: prefix.to_string(),
        })?
        .into_members("KEYS")
    }

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        self.query(Command::ZScore {
            key: key.to_string(),
            member: member.to_string(),
        })?
        .into_score("ZSCORE")
    }

    fn zcard(&self, key: &str) -> StorageResult<u64> {
        let n = self
            .query(Command::ZCard { key: key.to_string() })?
            .into_int("ZCARD")?;
        Ok(n.max(0) as u64)
    }

    fn zrevrange(&self, key: &str, start: i64, stop: i64) -> StorageResult<Vec<ScoredMember>> {
        self.query(Command::ZRevRange {
            key: key.to_string(),
            start,
            stop,
        })?
        .into_scored("ZREVRANGE")
    }

    fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        self.query(Command::SMembers { key: key.to_string() })?
            .into_members("SMEMBERS")
    }

    fn flushdb(&self) -> StorageResult<()> {
        self.query(Command::FlushDb).map(|_| ())
    }
}

/// Take the reply at `index` out of a batch result
pub fn nth_reply(replies: Vec<Reply>, index: usize, command: &'static str) -> StorageResult<Reply> {
    replies
        .into_iter()
        .nth(index)
        .ok_or(StorageError::UnexpectedReply {
            command,
            expected: "a reply for every command",
        })
}

/// Resolve an inclusive rank range against a collection of `len` members
///
/// Negative indices count from the end. Returns `(offset, count)` or `None`
/// when the range selects nothing.
pub(crate) fn resolve_range(len: i64, start: i64, stop: i64) -> Option<(i64, i64)> {
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start, stop - start + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range_positive() {
        assert_eq!(resolve_range(25, 10, 19), Some((10, 10)));
        assert_eq!(resolve_range(25, 0, 0), Some((0, 1)));
        assert_eq!(resolve_range(25, 20, 100), Some((20, 5)));
    }

    #[test]
    fn test_resolve_range_negative() {
        assert_eq!(resolve_range(25, 0, -1), Some((0, 25)));
        assert_eq!(resolve_range(25, -5, -1), Some((20, 5)));
        assert_eq!(resolve_range(3, -10, 1), Some((0, 2)));
    }

    #[test]
    fn test_resolve_range_empty() {
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 5, 10), None);
        assert_eq!(resolve_range(5, 3, 2), None);
        assert_eq!(resolve_range(5, 0, -6), None);
    }

    #[test]
    fn test_batch_builder_keeps_order() {
        let mut batch = Batch::new();
        batch
            .watch("link:a", "tags", Some("x".to_string()))
            .hset("link:a", vec![("tags".to_string(), "y".to_string())])
            .zrem("tag:x", "a")
            .zadd("tag:y", "a", 10.0);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.watches().len(), 1);
        let names: Vec<_> = batch.commands().iter().map(Command::name).collect();
        assert_eq!(names, vec!["HSET", "ZREM", "ZADD"]);
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Reply::Int(3).into_int("ZCARD").unwrap(), 3);
        assert!(Reply::Int(1).into_bool("EXISTS").unwrap());
        assert!(Reply::Ok.into_int("ZCARD").is_err());

        let scored = Reply::Scored(vec![ScoredMember {
            member: "a".to_string(),
            score: 1.0,
        }]);
        assert_eq!(scored.into_members("ZREVRANGE").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_aggregate_fold() {
        assert_eq!(Aggregate::Sum.fold(2.0, 3.0), 5.0);
        assert_eq!(Aggregate::Min.fold(2.0, 3.0), 2.0);
        assert_eq!(Aggregate::Max.fold(2.0, 3.0), 3.0);
    }
}
