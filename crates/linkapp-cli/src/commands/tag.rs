//! Tag command handlers

use anyhow::Result;

use linkapp_core::Store;

use crate::output::Output;

/// List all tags with usage counts
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let tags = store.links().tag_counts()?;
    output.print_tags(&tags)
}
