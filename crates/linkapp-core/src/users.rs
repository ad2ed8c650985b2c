//! User accounts
//!
//! Users live in `user:<username>` hashes holding the username and an
//! Argon2id password hash in PHC string form.

use std::sync::Arc;

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use tracing::{debug, warn};

use crate::error::{Error, Result, ValidationError};
use crate::models::User;
use crate::storage::{Batch, KeyValueStore};

fn user_key(username: &str) -> String {
    format!("user:{}", username)
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn KeyValueStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Create or replace a user
    ///
    /// With `pre_hashed` the password is taken to be a stored hash already
    /// (restores) and is written verbatim.
    pub fn add(&self, username: &str, password: &str, pre_hashed: bool) -> Result<String> {
        if username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        let password_hash = if pre_hashed {
            password.to_string()
        } else {
            hash_password(password)?
        };

        let mut batch = Batch::new();
        batch.hset(
            user_key(username),
            vec![
                ("username".to_string(), username.to_string()),
                ("password".to_string(), password_hash),
            ],
        );
        self.store.execute(&batch)?;

        debug!("Added user {}", username);
        Ok(username.to_string())
    }

    /// Check a password
    ///
    /// Unknown users and wrong passwords both give `false`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let Some(stored) = self.store.hget(&user_key(username), "password")? else {
            return Ok(false);
        };

        let parsed = match PasswordHash::new(&stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unreadable password hash for user {}: {}", username, e);
                return Ok(false);
            }
        };
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Replace a user's password
    pub fn modify(&self, username: &str, password: &str, pre_hashed: bool) -> Result<()> {
        let key = user_key(username);
        if !self.store.exists(&key)? {
            return Err(Error::NotFound {
                kind: "User",
                id: username.to_string(),
            });
        }
        let password_hash = if pre_hashed {
            password.to_string()
        } else {
            hash_password(password)?
        };

        let mut batch = Batch::new();
        batch.hset(key, vec![("password".to_string(), password_hash)]);
        self.store.execute(&batch)?;
        debug!("Changed password of {}", username);
        Ok(())
    }

    pub fn delete(&self, username: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch.del(user_key(username));
        self.store.execute(&batch)?;
        Ok(())
    }

    pub fn list_one(&self, username: &str) -> Result<Option<User>> {
        let mut fields = self.store.hgetall(&user_key(username))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(User {
            username: fields
                .remove("username")
                .unwrap_or_else(|| username.to_string()),
            password_hash: fields.remove("password").unwrap_or_default(),
        }))
    }

    /// Every user, sorted by name
    pub fn listing(&self) -> Result<Vec<User>> {
        let keys = self.store.keys("user:")?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = Batch::new();
        for key in &keys {
            batch.hgetall(key.as_str());
        }
        let replies = self.store.execute(&batch)?;

        let mut users = Vec::with_capacity(keys.len());
        for (key, reply) in keys.iter().zip(replies) {
            let mut fields = reply.into_hash("HGETALL")?;
            let fallback = key.strip_prefix("user:").unwrap_or(key);
            users.push(User {
                username: fields
                    .remove("username")
                    .unwrap_or_else(|| fallback.to_string()),
                password_hash: fields.remove("password").unwrap_or_default(),
            });
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}
