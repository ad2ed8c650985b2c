//! Link command handlers

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

use linkapp_core::models::CREATED_FORMAT;
use linkapp_core::{LinkId, LinkUpdate, NewLink, PageInfo, PageRequest, Store};

use crate::output::{short_id, Output};
use crate::prompt::{confirm, prompt_with_default};

/// Fields accepted by `link add`
pub struct AddArgs {
    pub url: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub replace: bool,
}

/// Fields accepted by `link edit`; all `None` means interactive editing
#[derive(Default)]
pub struct EditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created: Option<String>,
}

/// Create a new link
pub fn add(store: &Store, args: AddArgs, output: &Output) -> Result<()> {
    let links = store.links();
    if !args.replace && links.url_exists(&args.url)? {
        bail!(
            "URL has already been posted: {} (use --replace to overwrite)",
            LinkId::from_url(&args.url)
        );
    }

    let mut link = NewLink::new(args.title, args.description, args.url, args.author, args.tags);
    if let Some(created) = args.created {
        link = link.created_at(parse_created(&created)?);
    }

    let id = links.add(link).context("Failed to create link")?;

    output.success(&format!("Created link: {}", id));
    if let Some(link) = links.list_one(&id)? {
        output.print_link(&link)?;
    }
    Ok(())
}

/// List links carrying every given tag, one page at a time
pub fn list(
    store: &Store,
    tags: Vec<String>,
    page: u64,
    per_page: Option<u64>,
    output: &Output,
) -> Result<()> {
    let links = store.links();
    let request = PageRequest::new(page, per_page.unwrap_or(store.config().per_page));
    let (start, stop) = request.range();

    let page_links = links.list(&tags, start, stop)?;
    let info = PageInfo::new(request, links.count(&tags)?);

    output.print_links(&page_links, Some(&info))
}

/// Show a single link
pub fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;

    let link = store
        .links()
        .list_one(&link_id)?
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", id))?;

    output.print_link(&link)
}

/// Edit a link
pub fn edit(store: &Store, id: String, args: EditArgs, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    let links = store.links();

    let link = links
        .list_one(&link_id)?
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", id))?;

    let mut update = LinkUpdate {
        title: args.title,
        description: args.description,
        url: args.url,
        author: args.author,
        tags: args.tags,
        created_at: args.created.as_deref().map(parse_created).transpose()?,
    };

    if update.is_empty() {
        println!("Editing link: {}", link.id);
        println!("Press Enter to keep current value, or type new value.\n");

        update.title = prompt_with_default("Title", &link.title)?;
        update.description = prompt_with_default("Description", &link.description)?;
        update.url = prompt_with_default("URL", &link.url)?;
        update.tags = prompt_with_default("Tags (comma-separated)", &link.tags.join(", "))?
            .map(|tags| split_tags(&tags));

        if update.is_empty() {
            output.message("Nothing changed.");
            return Ok(());
        }
    }

    if let Some(url) = &update.url {
        if links.url_changed(&link_id, url) && links.url_exists(url)? {
            bail!("URL has already been posted: {}", LinkId::from_url(url));
        }
    }

    let new_id = links
        .modify(&link_id, update)
        .context("Failed to update link")?;

    output.success("Link updated");
    if let Some(link) = links.list_one(&new_id)? {
        output.print_link(&link)?;
    }
    Ok(())
}

/// Delete a link
pub fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let link_id = resolve_link_id(&id, store)?;
    let links = store.links();

    let link = links
        .list_one(&link_id)?
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", id))?;

    if output.should_prompt() {
        println!("Delete link: {} - {}", short_id(link.id.as_str()), link.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    links.delete(&link_id).context("Failed to delete link")?;

    output.success(&format!("Deleted link: {}", link_id));
    Ok(())
}

/// Count links carrying every given tag
pub fn count(store: &Store, tags: Vec<String>, output: &Output) -> Result<()> {
    output.print_count(store.links().count(&tags)?)
}

/// Resolve a link id from a full id, an id prefix or the link's URL
pub fn resolve_link_id(id: &str, store: &Store) -> Result<LinkId> {
    if id.contains("://") {
        return Ok(LinkId::from_url(id));
    }
    if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(LinkId::new(id.to_ascii_lowercase()));
    }

    let links = store.links().listing()?;
    let matches: Vec<_> = links
        .iter()
        .filter(|l| l.id.as_str().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No link found matching: {}", id),
        1 => Ok(matches[0].id.clone()),
        _ => {
            eprintln!("Multiple links match '{}':", id);
            for link in &matches {
                eprintln!("  {} - {}", link.id, link.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Parse a creation time given as RFC 3339 or in the stored pattern
pub fn parse_created(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, CREATED_FORMAT)
        .map(|at| at.and_utc())
        .with_context(|| {
            format!(
                "Invalid time '{}'. Use RFC 3339 or MM-DD-YYYY @ HH:MM",
                value
            )
        })
}

/// Split a comma-separated tag list
pub fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
