//! auto-m4b - watches an inbox folder and converts loose audiobook files
//! into single-file M4B audiobooks.
//!
//! - `models`: the Audiobook/Config/error types shared across the crate
//! - `core`: path classification, the pipeline state machine, the scheduler
//! - `audio`: probing, tag I/O, and the external converter driver
//! - `utils`: config file management, dependency checks, sorting helpers
//! - `cli`: argument parsing and command handlers

pub mod audio;
pub mod cli;
pub mod core;
pub mod models;
pub mod utils;

pub use models::{Audiobook, Config, OrchestratorError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
