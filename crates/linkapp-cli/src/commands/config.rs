//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use linkapp_core::Config;

use crate::output::{Output, OutputFormat};

fn or_not_set(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "database": config.database_path(),
                    "db": config.db,
                    "per_page": config.per_page,
                    "busy_timeout_ms": config.busy_timeout_ms,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path().display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:        {}", config.data_dir.display());
            println!("  database:        {}", config.database_path().display());
            println!("  db:              {}", config.db);
            println!("  per_page:        {}", config.per_page);
            println!("  busy_timeout_ms: {}", config.busy_timeout_ms);
            println!("  log_file:        {}", or_not_set(&config.log_file));
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    let optional_path = |value: &str| -> Option<PathBuf> {
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.into())
        }
    };

    match key.as_str() {
        "data_dir" => config.data_dir = value.clone().into(),
        "database" => config.database = optional_path(&value),
        "db" => {
            config.db = value
                .parse()
                .context("Invalid value for db. Use a non-negative integer.")?;
        }
        "per_page" => {
            config.per_page = value
                .parse()
                .context("Invalid value for per_page. Use a positive integer.")?;
        }
        "busy_timeout_ms" => {
            config.busy_timeout_ms = value
                .parse()
                .context("Invalid value for busy_timeout_ms. Use milliseconds.")?;
        }
        "log_file" => config.log_file = optional_path(&value),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, database, db, per_page, busy_timeout_ms, log_file",
                key
            );
        }
    }

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
