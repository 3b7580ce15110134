//! Process-wide watcher state: PID/lock file, the failed-books set (mirrored
//! to the `FAILED_BOOKS` environment variable), and the inbox mtime guard.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::Local;
use regex::Regex;

use crate::models::OrchestratorError;

const FAILED_BOOKS_ENV: &str = "FAILED_BOOKS";
const FAILED_BOOKS_SEP: &str = "\u{1f}"; // unit separator, unlikely in a basename

/// Process-wide watcher state, owned by the scheduler and passed by
/// reference to every component that needs it.
pub struct WatcherState {
    pub pid_file: PathBuf,
    pub fatal_file: PathBuf,
    failed_books: HashSet<String>,
    pub last_inbox_mtime: Option<SystemTime>,
}

impl WatcherState {
    pub fn new(pid_file: PathBuf, fatal_file: PathBuf) -> Self {
        let failed_books = std::env::var(FAILED_BOOKS_ENV)
            .ok()
            .map(|v| v.split(FAILED_BOOKS_SEP).map(String::from).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        Self { pid_file, fatal_file, failed_books, last_inbox_mtime: None }
    }

    /// Create the PID file on first run, or fail fatally if one is already
    /// present (a second instance should refuse to start).
    pub fn claim_pid_file(&self, inbox_dir: &Path) -> Result<(), OrchestratorError> {
        if self.pid_file.exists() {
            return Ok(());
        }
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let banner = format!("auto-m4b started at {now}, watching {}\n", inbox_dir.display());
        std::fs::write(&self.pid_file, banner).map_err(|e| {
            OrchestratorError::FatalProcess(format!("could not create PID file: {e}"))
        })
    }

    pub fn is_first_run(&self) -> bool {
        !self.pid_file.exists()
    }

    pub fn write_fatal_sentinel(&self, reason: &str) -> Result<()> {
        std::fs::write(&self.fatal_file, reason).context("writing fatal sentinel file")
    }

    pub fn mark_failed(&mut self, key: &str) {
        self.failed_books.insert(key.to_string());
        self.sync_env();
    }

    pub fn is_failed(&self, key: &str) -> bool {
        self.failed_books.contains(key)
    }

    fn sync_env(&self) {
        let joined = self.failed_books.iter().cloned().collect::<Vec<_>>().join(FAILED_BOOKS_SEP);
        std::env::set_var(FAILED_BOOKS_ENV, joined);
    }
}

/// Compile a basename match filter regex, if configured.
pub fn match_filter_regex(pattern: &Option<String>) -> Option<Regex> {
    pattern.as_ref().and_then(|p| Regex::new(p).ok())
}
