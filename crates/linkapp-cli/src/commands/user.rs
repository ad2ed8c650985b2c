//! User command handlers

use anyhow::{bail, Context, Result};

use linkapp_core::Store;

use crate::output::Output;
use crate::prompt;

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => prompt::password("Password"),
    }
}

pub fn add(store: &Store, username: String, password: Option<String>, output: &Output) -> Result<()> {
    let password = password_or_prompt(password)?;
    store
        .users()
        .add(&username, &password, false)
        .context("Failed to add user")?;
    output.success(&format!("Added user: {}", username));
    Ok(())
}

/// Change a user's password
pub fn passwd(
    store: &Store,
    username: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    store
        .users()
        .modify(&username, &password, false)
        .context("Failed to change password")?;
    output.success(&format!("Password changed for {}", username));
    Ok(())
}

pub fn delete(store: &Store, username: String, output: &Output) -> Result<()> {
    store.users().delete(&username)?;
    output.success(&format!("Deleted user: {}", username));
    Ok(())
}

pub fn list(store: &Store, output: &Output) -> Result<()> {
    let users = store.users().listing()?;
    output.print_users(&users)
}

/// Verify a password, failing when it does not match
pub fn check(
    store: &Store,
    username: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = password_or_prompt(password)?;
    if !store.users().authenticate(&username, &password)? {
        bail!("Authentication failed for {}", username);
    }
    output.success(&format!("Credentials valid for {}", username));
    Ok(())
}
