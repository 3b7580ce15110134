//! CLI command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::banner;
use crate::cli::commands::ConfigCommands;
use crate::core::scheduler::Scheduler;
use crate::models::Config;
use crate::utils::{ConfigManager, DependencyChecker};

/// Handle `auto-m4b watch`: run the scheduler loop until a fatal error.
pub async fn handle_watch(config: Config) -> Result<()> {
    tracing::info!(inbox = %config.directories.inbox_dir.display(), "starting auto-m4b");
    let mut scheduler = Scheduler::new(config);
    scheduler.run().await
}

/// Handle `auto-m4b check`: report whether the merge tool and ffprobe are
/// reachable.
pub fn handle_check(config: &Config) -> Result<()> {
    let statuses = DependencyChecker::check_all(config);
    print!("{}", banner::render_dependency_report(&statuses));
    if statuses.iter().all(|s| s.found) {
        Ok(())
    } else {
        anyhow::bail!("one or more dependencies are missing")
    }
}

/// Handle `auto-m4b config <subcommand>`.
pub fn handle_config(command: ConfigCommands, config_path: Option<&PathBuf>) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = ConfigManager::init(force)?;
            println!("Configuration file created: {}", path.display());
        }
        ConfigCommands::Show => {
            let yaml = ConfigManager::show(config_path)?;
            print!("{yaml}");
        }
        ConfigCommands::Validate => {
            let config = ConfigManager::load_or_default(config_path)?;
            let warnings = ConfigManager::validate(&config).context("validating configuration")?;
            if warnings.is_empty() {
                println!("Configuration is valid");
            } else {
                println!("Configuration has {} warning(s):", warnings.len());
                for warning in &warnings {
                    println!("  - {warning}");
                }
            }
        }
        ConfigCommands::Path => {
            let path = match config_path {
                Some(p) => p.clone(),
                None => ConfigManager::default_config_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}
