//! CLI module

pub mod banner;
mod commands;
mod handlers;

pub use commands::{Cli, Commands, ConfigCommands};
pub use handlers::{handle_check, handle_config, handle_watch};
