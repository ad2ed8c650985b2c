//! linkapp CLI
//!
//! Command-line interface for linkapp - shared links, reading lists and
//! user accounts.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use linkapp_core::store::DEFAULT_ADMIN;
use linkapp_core::{Config, Store};

mod commands;
mod output;
mod prompt;

use commands::link::{split_tags, AddArgs, EditArgs};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "linkapp")]
#[command(about = "linkapp - Shared, tag-indexed link collection")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// List all tags
    Tags,
    /// Manage a user's reading list
    ReadingList {
        /// Whose reading list
        #[arg(short, long, default_value = DEFAULT_ADMIN.0)]
        user: String,
        #[command(subcommand)]
        command: ReadingListCommands,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Delete all data and recreate the admin user
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Write all links and users to a JSON file
    Backup {
        /// Backup file (default: data_backup.json)
        file: Option<PathBuf>,
    },
    /// Load links and users from a JSON backup
    Restore {
        /// Backup file (default: data_backup.json)
        file: Option<PathBuf>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Save a new link
    #[command(alias = "create")]
    Add {
        /// URL to save
        url: String,
        /// Page title
        #[arg(short = 'T', long)]
        title: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Who saved it
        #[arg(short, long, default_value = DEFAULT_ADMIN.0)]
        author: String,
        /// Tags (repeat or comma-separate)
        #[arg(short, long, required = true)]
        tag: Vec<String>,
        /// Creation time (RFC 3339 or MM-DD-YYYY @ HH:MM)
        #[arg(long)]
        created: Option<String>,
        /// Overwrite a link already saved under this URL
        #[arg(long)]
        replace: bool,
    },
    /// List links, most recent first
    #[command(alias = "ls")]
    List {
        /// Only links carrying every given tag
        #[arg(short, long)]
        tag: Vec<String>,
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: u64,
        /// Links per page (default from config)
        #[arg(long)]
        per_page: Option<u64>,
    },
    /// Show link details
    Show {
        /// Link ID, ID prefix or URL
        id: String,
    },
    /// Edit a link (interactive when no field is given)
    Edit {
        /// Link ID, ID prefix or URL
        id: String,
        #[arg(short = 'T', long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// New URL (moves the link to a new ID)
        #[arg(short, long)]
        url: Option<String>,
        #[arg(short, long)]
        author: Option<String>,
        /// Replace all tags (repeat or comma-separate)
        #[arg(short, long)]
        tag: Vec<String>,
        /// New creation time (RFC 3339 or MM-DD-YYYY @ HH:MM)
        #[arg(long)]
        created: Option<String>,
    },
    /// Delete a link
    #[command(alias = "rm")]
    Delete {
        /// Link ID, ID prefix or URL
        id: String,
    },
    /// Count links
    Count {
        /// Only links carrying every given tag
        #[arg(short, long)]
        tag: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ReadingListCommands {
    /// Save a link for later
    Add { id: String },
    /// Mark a saved link as read
    Read { id: String },
    /// Mark a link as unread again
    Unread { id: String },
    /// Drop a link from the list
    #[command(alias = "rm")]
    Remove { id: String },
    /// Links still to read
    #[command(alias = "ls")]
    List,
    /// Links already read
    Done,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user (prompts for the password if not given)
    Add {
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change a user's password
    Passwd {
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Delete a user
    #[command(alias = "rm")]
    Delete { username: String },
    /// List users
    #[command(alias = "ls")]
    List,
    /// Check a user's password
    Check {
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database, db, per_page, busy_timeout_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without a database
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    let store = Store::open_with_config(config)?;
    debug!("Store ready");

    match cli.command {
        Commands::Link { command } => handle_link_command(command, &store, &output),
        Commands::Tags => commands::tag::list(&store, &output),
        Commands::ReadingList { user, command } => {
            handle_reading_list_command(command, &user, &store, &output)
        }
        Commands::User { command } => handle_user_command(command, &store, &output),
        Commands::Reset { yes } => commands::database::reset(&store, yes, &output),
        Commands::Backup { file } => commands::database::backup(&store, file, &output),
        Commands::Restore { file } => commands::database::restore(&store, file, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Flatten repeated and comma-separated tag arguments
fn collect_tags(args: Vec<String>) -> Vec<String> {
    args.iter().flat_map(|arg| split_tags(arg)).collect()
}

fn handle_link_command(command: LinkCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        LinkCommands::Add {
            url,
            title,
            description,
            author,
            tag,
            created,
            replace,
        } => {
            let args = AddArgs {
                url,
                title,
                description,
                author,
                tags: collect_tags(tag),
                created,
                replace,
            };
            commands::link::add(store, args, output)
        }
        LinkCommands::List {
            tag,
            page,
            per_page,
        } => commands::link::list(store, collect_tags(tag), page, per_page, output),
        LinkCommands::Show { id } => commands::link::show(store, id, output),
        LinkCommands::Edit {
            id,
            title,
            description,
            url,
            author,
            tag,
            created,
        } => {
            let args = EditArgs {
                title,
                description,
                url,
                author,
                tags: (!tag.is_empty()).then(|| collect_tags(tag)),
                created,
            };
            commands::link::edit(store, id, args, output)
        }
        LinkCommands::Delete { id } => commands::link::delete(store, id, output),
        LinkCommands::Count { tag } => commands::link::count(store, collect_tags(tag), output),
    }
}

fn handle_reading_list_command(
    command: ReadingListCommands,
    user: &str,
    store: &Store,
    output: &Output,
) -> Result<()> {
    use commands::reading_list;

    match command {
        ReadingListCommands::Add { id } => reading_list::add(store, user, id, output),
        ReadingListCommands::Read { id } => reading_list::read(store, user, id, output),
        ReadingListCommands::Unread { id } => reading_list::unread(store, user, id, output),
        ReadingListCommands::Remove { id } => reading_list::remove(store, user, id, output),
        ReadingListCommands::List => reading_list::list(store, user, output),
        ReadingListCommands::Done => reading_list::done(store, user, output),
    }
}

fn handle_user_command(command: UserCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        UserCommands::Add { username, password } => {
            commands::user::add(store, username, password, output)
        }
        UserCommands::Passwd { username, password } => {
            commands::user::passwd(store, username, password, output)
        }
        UserCommands::Delete { username } => commands::user::delete(store, username, output),
        UserCommands::List => commands::user::list(store, output),
        UserCommands::Check { username, password } => {
            commands::user::check(store, username, password, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// The filter comes from LINKAPP_LOG (default "warn"). Logs go to
/// config.log_file when set, stderr otherwise.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_env("LINKAPP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(log_path) = &config.log_file {
        match File::create(log_path) {
            Ok(log_file) => {
                // Ignore error if already initialized
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log_file)
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
