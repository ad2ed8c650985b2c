//! Reset, backup and restore handlers

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use linkapp_core::store::DEFAULT_ADMIN;
use linkapp_core::{Backup, Store, DEFAULT_BACKUP_FILE};

use crate::output::Output;
use crate::prompt::confirm;

fn backup_path(file: Option<PathBuf>) -> PathBuf {
    file.unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_FILE))
}

/// Wipe the database and recreate the admin account
pub fn reset(store: &Store, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() {
        println!(
            "This deletes every link, reading list and user in {:?} (db {}).",
            store.config().database_path(),
            store.config().db
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.reset()?;

    let (username, password) = DEFAULT_ADMIN;
    output.success(&format!(
        "Database reset. Log in as '{}' with password '{}'",
        username, password
    ));
    Ok(())
}

/// Write every link and user to a JSON file
pub fn backup(store: &Store, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let path = backup_path(file);
    let snapshot =
        Backup::capture(store.links(), store.users()).context("Failed to read database")?;

    write_backup(&snapshot, &path)?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "file": path,
                "links": snapshot.links.len(),
                "users": snapshot.users.len()
            })
        );
    } else {
        output.success(&format!(
            "Backed up {} link(s) and {} user(s) to {}",
            snapshot.links.len(),
            snapshot.users.len(),
            path.display()
        ));
    }
    Ok(())
}

/// Replay a JSON backup into the database
pub fn restore(store: &Store, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let path = backup_path(file);
    let snapshot = read_backup(&path)?;

    let stats = snapshot
        .restore(store.links(), store.users())
        .with_context(|| format!("Failed to restore {}", path.display()))?;

    if output.is_json() {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        output.success(&format!(
            "Restored {} link(s) and {} user(s) from {}",
            stats.links,
            stats.users,
            path.display()
        ));
    }
    Ok(())
}

fn write_backup(snapshot: &Backup, path: &Path) -> Result<()> {
    let json = snapshot.to_json()?;
    fs::write(path, json).with_context(|| format!("Failed to write backup: {:?}", path))
}

fn read_backup(path: &Path) -> Result<Backup> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read backup: {:?}", path))?;
    Backup::from_json(&json).with_context(|| format!("Failed to parse backup: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkapp_core::NewLink;

    #[test]
    fn test_backup_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = Store::open_in_memory().unwrap();
        source
            .links()
            .add(NewLink::new("T", "D", "http://a.com", "admin", vec!["t".to_string()]))
            .unwrap();
        source.users().add("admin", "password", false).unwrap();
        write_backup(
            &Backup::capture(source.links(), source.users()).unwrap(),
            &path,
        )
        .unwrap();

        let target = Store::open_in_memory().unwrap();
        read_backup(&path)
            .unwrap()
            .restore(target.links(), target.users())
            .unwrap();

        assert!(target.links().url_exists("http://a.com").unwrap());
        assert!(target.users().authenticate("admin", "password").unwrap());
    }

    #[test]
    fn test_default_backup_path() {
        assert_eq!(backup_path(None), PathBuf::from("data_backup.json"));
        assert_eq!(
            backup_path(Some(PathBuf::from("/tmp/x.json"))),
            PathBuf::from("/tmp/x.json")
        );
    }

    #[test]
    fn test_missing_backup_file() {
        let err = read_backup(Path::new("/nonexistent/backup.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read backup"));
    }
}
