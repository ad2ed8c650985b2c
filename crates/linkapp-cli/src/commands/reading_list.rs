//! Reading-list command handlers

use anyhow::{Context, Result};

use linkapp_core::Store;

use crate::commands::link::resolve_link_id;
use crate::output::Output;

/// Save a link to a user's reading list
pub fn add(store: &Store, user: &str, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    if !store.links().exists(&link_id)? {
        anyhow::bail!("Link not found: {}", id);
    }

    store
        .reading_list()
        .add(user, &link_id)
        .context("Failed to save link")?;
    output.success(&format!("Saved {} for {}", link_id, user));
    Ok(())
}

pub fn read(store: &Store, user: &str, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    store.reading_list().read(user, &link_id)?;
    output.success(&format!("Marked {} as read", link_id));
    Ok(())
}

pub fn unread(store: &Store, user: &str, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    store.reading_list().unread(user, &link_id)?;
    output.success(&format!("Marked {} as unread", link_id));
    Ok(())
}

pub fn remove(store: &Store, user: &str, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    store.reading_list().remove(user, &link_id)?;
    output.success(&format!("Removed {} from {}'s reading list", link_id, user));
    Ok(())
}

/// Links saved and not yet read
pub fn list(store: &Store, user: &str, output: &Output) -> Result<()> {
    let links = store.reading_list().to_read(user)?;
    output.print_links(&links, None)
}

/// Links saved and already read
pub fn done(store: &Store, user: &str, output: &Output) -> Result<()> {
    let links = store.reading_list().been_read(user)?;
    output.print_links(&links, None)
}
