//! auto-m4b CLI entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use auto_m4b::cli::{handle_check, handle_config, handle_watch, Cli, Commands};
use auto_m4b::utils::ConfigManager;
use auto_m4b::{Config, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Watch => handle_watch(config).await?,
        Commands::Check => handle_check(&config)?,
        Commands::Config(command) => handle_config(command, cli.config.as_ref())?,
        Commands::Version => {
            println!("auto-m4b {VERSION}");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("auto_m4b=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("auto_m4b=info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) if path.exists() => ConfigManager::load(path),
        Some(_) => {
            tracing::debug!("configured path does not exist, using defaults");
            Ok(Config::default())
        }
        None => ConfigManager::load_or_default(None),
    }
}
