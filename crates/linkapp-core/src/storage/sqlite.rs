//! SQLite-backed key-value engine
//!
//! Implements [`KeyValueStore`] on three tables (hashes, sets, sorted sets)
//! partitioned by a logical database index. Each [`Batch`] runs inside one
//! `BEGIN IMMEDIATE` transaction, so a batch is applied completely or not
//! at all and concurrent writers are serialised by SQLite itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::kv::{resolve_range, Batch, Combine, Command, KeyValueStore, Reply, ScoredMember};
use super::schema::{init_schema, needs_init};

/// Busy timeout used when none is configured
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value engine stored in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db: i64,
}

impl SqliteStore {
    /// Open or create the database at `path`, using logical database `db`
    pub fn open(path: &Path, db: u32) -> StorageResult<Self> {
        Self::open_with_timeout(path, db, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with an explicit busy timeout
    pub fn open_with_timeout(path: &Path, db: u32, busy_timeout: Duration) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    StorageError::CreateDirectory {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened key-value store at {:?} (db {})", path, db);
        Ok(Self {
            conn: Mutex::new(conn),
            db: i64::from(db),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db: 0,
        })
    }

    /// The logical database index this handle reads and writes
    pub fn db(&self) -> u32 {
        self.db as u32
    }
}

impl KeyValueStore for SqliteStore {
    fn execute(&self, batch: &Batch) -> StorageResult<Vec<Reply>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping `tx` on any early return rolls the batch back
        for watch in batch.watches() {
            let current = hget(&tx, self.db, &watch.key, &watch.field)?;
            if current != watch.expected {
                debug!("Watch on {}.{} failed, discarding batch", watch.key, watch.field);
                return Err(StorageError::WatchConflict {
                    key: watch.key.clone(),
                });
            }
        }

        let mut replies = Vec::with_capacity(batch.len());
        for command in batch.commands() {
            replies.push(apply(&tx, self.db, command)?);
        }

        tx.commit()?;
        Ok(replies)
    }
}

// ==================== Command application ====================

fn apply(conn: &Connection, db: i64, command: &Command) -> StorageResult<Reply> {
    let reply = match command {
        Command::HSet { key, fields } => {
            for (field, value) in fields {
                conn.execute(
                    r#"
                    INSERT INTO kv_hashes (db, key, field, value) VALUES (?, ?, ?, ?)
                    ON CONFLICT (db, key, field) DO UPDATE SET value = excluded.value
                    "#,
                    params![db, key, field, value],
                )?;
            }
            Reply::Ok
        }
        Command::HGetAll { key } => {
            let mut stmt =
                conn.prepare_cached("SELECT field, value FROM kv_hashes WHERE db = ? AND key = ?")?;
            let fields = stmt
                .query_map(params![db, key], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<HashMap<String, String>, _>>()?;
            Reply::Hash(fields)
        }
        Command::HGet { key, field } => Reply::Value(hget(conn, db, key, field)?),
        Command::Del { key } => Reply::Int(delete_key(conn, db, key)? as i64),
        Command::Exists { key } => {
            let exists: bool = conn.query_row(
                r#"
                SELECT EXISTS (SELECT 1 FROM kv_hashes WHERE db = ?1 AND key = ?2)
                    OR EXISTS (SELECT 1 FROM kv_sets WHERE db = ?1 AND key = ?2)
                    OR EXISTS (SELECT 1 FROM kv_zsets WHERE db = ?1 AND key = ?2)
                "#,
                params![db, key],
                |row| row.get(0),
            )?;
            Reply::Int(i64::from(exists))
        }
        Command::Keys { prefix } => {
            let len = prefix.chars().count() as i64;
            let mut stmt = conn.prepare_cached(
                r#"
                SELECT key FROM kv_hashes WHERE db = ?1 AND substr(key, 1, ?2) = ?3
                UNION SELECT key FROM kv_sets WHERE db = ?1 AND substr(key, 1, ?2) = ?3
                UNION SELECT key FROM kv_zsets WHERE db = ?1 AND substr(key, 1, ?2) = ?3
                ORDER BY key
                "#,
            )?;
            let keys = stmt
                .query_map(params![db, len, prefix], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Reply::Members(keys)
        }
        Command::ZAdd { key, member, score } => {
            if score.is_nan() {
                return Err(StorageError::InvalidCommand {
                    command: "ZADD",
                    details: "score is not a number".to_string(),
                });
            }
            let existed = zscore(conn, db, key, member)?.is_some();
            conn.execute(
                r#"
                INSERT INTO kv_zsets (db, key, member, score) VALUES (?, ?, ?, ?)
                ON CONFLICT (db, key, member) DO UPDATE SET score = excluded.score
                "#,
                params![db, key, member, score],
            )?;
            Reply::Int(i64::from(!existed))
        }
        Command::ZRem { key, member } => {
            let removed = conn.execute(
                "DELETE FROM kv_zsets WHERE db = ? AND key = ? AND member = ?",
                params![db, key, member],
            )?;
            Reply::Int(removed as i64)
        }
        Command::ZScore { key, member } => Reply::Score(zscore(conn, db, key, member)?),
        Command::ZCard { key } => Reply::Int(zcard(conn, db, key)?),
        Command::ZRevRange { key, start, stop } => {
            let len = zcard(conn, db, key)?;
            let members = match resolve_range(len, *start, *stop) {
                Some((offset, count)) => zrevrange(conn, db, key, offset, count)?,
                None => Vec::new(),
            };
            Reply::Scored(members)
        }
        Command::ZRevRangeByScore { key, min, max } => {
            Reply::Scored(zrevrangebyscore(conn, db, key, *min, *max)?)
        }
        Command::ZStore {
            dest,
            sources,
            combine,
            aggregate,
        } => {
            let mut combined: HashMap<String, (f64, usize)> = HashMap::new();
            for (source, weight) in sources {
                for (member, score) in load_scored(conn, db, source)? {
                    let weighted = score * weight;
                    combined
                        .entry(member)
                        .and_modify(|(acc, seen)| {
                            *acc = aggregate.fold(*acc, weighted);
                            *seen += 1;
                        })
                        .or_insert((weighted, 1));
                }
            }

            if *combine == Combine::Intersection {
                combined.retain(|_, (_, seen)| *seen == sources.len());
            }

            delete_key(conn, db, dest)?;
            let mut stmt = conn.prepare_cached(
                "INSERT INTO kv_zsets (db, key, member, score) VALUES (?, ?, ?, ?)",
            )?;
            for (member, (score, _)) in &combined {
                stmt.execute(params![db, dest, member, score])?;
            }
            Reply::Int(combined.len() as i64)
        }
        Command::SAdd { key, member } => {
            let added = conn.execute(
                "INSERT OR IGNORE INTO kv_sets (db, key, member) VALUES (?, ?, ?)",
                params![db, key, member],
            )?;
            Reply::Int(added as i64)
        }
        Command::SRem { key, member } => {
            let removed = conn.execute(
                "DELETE FROM kv_sets WHERE db = ? AND key = ? AND member = ?",
                params![db, key, member],
            )?;
            Reply::Int(removed as i64)
        }
        Command::SMembers { key } => {
            let mut stmt = conn.prepare_cached(
                "SELECT member FROM kv_sets WHERE db = ? AND key = ? ORDER BY member",
            )?;
            let members = stmt
                .query_map(params![db, key], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Reply::Members(members)
        }
        Command::FlushDb => {
            conn.execute("DELETE FROM kv_hashes WHERE db = ?", params![db])?;
            conn.execute("DELETE FROM kv_sets WHERE db = ?", params![db])?;
            conn.execute("DELETE FROM kv_zsets WHERE db = ?", params![db])?;
            Reply::Ok
        }
    };
    Ok(reply)
}

// ==================== Query helpers ====================

fn hget(conn: &Connection, db: i64, key: &str, field: &str) -> StorageResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_hashes WHERE db = ? AND key = ? AND field = ?",
            params![db, key, field],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn zscore(conn: &Connection, db: i64, key: &str, member: &str) -> StorageResult<Option<f64>> {
    let score = conn
        .query_row(
            "SELECT score FROM kv_zsets WHERE db = ? AND key = ? AND member = ?",
            params![db, key, member],
            |row| row.get(0),
        )
        .optional()?;
    Ok(score)
}

fn zcard(conn: &Connection, db: i64, key: &str) -> StorageResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM kv_zsets WHERE db = ? AND key = ?",
        params![db, key],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn zrevrange(
    conn: &Connection,
    db: i64,
    key: &str,
    offset: i64,
    count: i64,
) -> StorageResult<Vec<ScoredMember>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT member, score FROM kv_zsets
        WHERE db = ? AND key = ?
        ORDER BY score DESC, member DESC
        LIMIT ? OFFSET ?
        "#,
    )?;
    let rows = stmt
        .query_map(params![db, key, count, offset], scored_member)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn zrevrangebyscore(
    conn: &Connection,
    db: i64,
    key: &str,
    min: f64,
    max: f64,
) -> StorageResult<Vec<ScoredMember>> {
    // Infinite bounds are left out of the SQL rather than bound as REALs
    let mut sql = String::from("SELECT member, score FROM kv_zsets WHERE db = ? AND key = ?");
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&db, &key];
    if min.is_finite() {
        sql.push_str(" AND score >= ?");
        values.push(&min);
    }
    if max.is_finite() {
        sql.push_str(" AND score <= ?");
        values.push(&max);
    }
    sql.push_str(" ORDER BY score DESC, member DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(values.as_slice(), scored_member)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Members and scores of a sorted set, or of a plain set with score 1
fn load_scored(conn: &Connection, db: i64, key: &str) -> StorageResult<Vec<(String, f64)>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT member, score FROM kv_zsets WHERE db = ?1 AND key = ?2
        UNION ALL
        SELECT member, 1.0 FROM kv_sets WHERE db = ?1 AND key = ?2
        "#,
    )?;
    let rows = stmt
        .query_map(params![db, key], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn delete_key(conn: &Connection, db: i64, key: &str) -> StorageResult<bool> {
    let mut removed = 0;
    removed += conn.execute(
        "DELETE FROM kv_hashes WHERE db = ? AND key = ?",
        params![db, key],
    )?;
    removed += conn.execute(
        "DELETE FROM kv_sets WHERE db = ? AND key = ?",
        params![db, key],
    )?;
    removed += conn.execute(
        "DELETE FROM kv_zsets WHERE db = ? AND key = ?",
        params![db, key],
    )?;
    Ok(removed > 0)
}

fn scored_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScoredMember> {
    Ok(ScoredMember {
        member: row.get(0)?,
        score: row.get(1)?,
    })
}
