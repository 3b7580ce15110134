//! CLI commands and arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::VERSION;

/// auto-m4b - watch an inbox folder and convert audiobooks to M4B
#[derive(Parser)]
#[command(name = "auto-m4b")]
#[command(version = VERSION)]
#[command(about = "Watch an inbox folder and convert loose audiobook files into M4B")]
#[command(long_about = "
auto-m4b watches an inbox directory for audiobook folders (or standalone MP3s),
classifies their layout, drives an external merge tool to build a single M4B
per book, writes authoritative ID3 tags, and publishes the result to a
converted-books folder — all without supervision.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(global = true, short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to the platform config directory)
    #[arg(global = true, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the watch loop: scan the inbox forever, converting books as they arrive
    Watch,

    /// Check that the merge tool and ffprobe are reachable on PATH
    Check,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as YAML
    Show,

    /// Validate the configuration and report warnings
    Validate,

    /// Print the config file path
    Path,
}
