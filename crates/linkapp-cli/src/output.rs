//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::Result;
use serde::Serialize;

use linkapp_core::{Link, PageInfo, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single link
    pub fn print_link(&self, link: &Link) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", link.id);
                println!("Title:       {}", link.title);
                println!("URL:         {}", link.url);
                if !link.description.is_empty() {
                    println!("Description: {}", link.description);
                }
                println!("Author:      {}", link.author);
                println!("Tags:        {}", link.tags.join(", "));
                println!("Created:     {}", link.created_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(link)?,
            OutputFormat::Quiet => println!("{}", link.id),
        }
        Ok(())
    }

    /// Print a list of links, with page navigation when given
    pub fn print_links(&self, links: &[Link], page: Option<&PageInfo>) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if links.is_empty() {
                    println!("No links found.");
                    return Ok(());
                }
                for link in links {
                    println!(
                        "{} | {} | {} | {}",
                        short_id(link.id.as_str()),
                        truncate(&link.title, 35),
                        truncate(&link.url, 45),
                        link.tags.join(", ")
                    );
                }
                match page {
                    Some(page) => println!(
                        "\nPage {} of {} ({} link(s))",
                        page.page, page.last, page.count
                    ),
                    None => println!("\n{} link(s)", links.len()),
                }
            }
            OutputFormat::Json => match page {
                Some(page) => print_json(&serde_json::json!({"links": links, "page": page}))?,
                None => print_json(&links)?,
            },
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.id);
                }
            }
        }
        Ok(())
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[(String, u64)]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return Ok(());
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                print_json(&json_tags)?;
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
        Ok(())
    }

    /// Print user names; hashes are never shown
    pub fn print_users(&self, users: &[User]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No users found.");
                    return Ok(());
                }
                for user in users {
                    println!("{}", user.username);
                }
                println!("\n{} user(s)", users.len());
            }
            OutputFormat::Json => {
                let names: Vec<_> = users.iter().map(|u| &u.username).collect();
                print_json(&names)?;
            }
            OutputFormat::Quiet => {
                for user in users {
                    println!("{}", user.username);
                }
            }
        }
        Ok(())
    }

    /// Print a bare count
    pub fn print_count(&self, count: u64) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(&serde_json::json!({"count": count})),
            _ => {
                println!("{}", count);
                Ok(())
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First eight characters of an id, or all of it when shorter
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
