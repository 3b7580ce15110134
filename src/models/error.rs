//! Error taxonomy for the inbox orchestrator
//!
//! Each variant carries the routing behaviour described for it: some end a
//! book's processing for this tick only, others quarantine it, others stop
//! the whole watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while walking the pipeline for a single book.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Book shape requires manual fixing. Route: quarantine to `fix_root`.
    #[error("structural problem with '{key}': {reason}")]
    Structural { key: String, reason: String },

    /// The external merge tool returned fatal output or produced no artifact.
    #[error("conversion failed for '{key}': {reason}")]
    Conversion { key: String, reason: String },

    /// Metadata read/write on a non-audio or corrupt file.
    #[error("bad audio file {path:?}: {reason}")]
    BadFile { path: PathBuf, reason: String },

    /// Backup verification disagreed beyond tolerance.
    #[error("backup mismatch for '{key}': {reason}")]
    BackupMismatch { key: String, reason: String },

    /// A book with the same key already sits in the fix folder.
    #[error("'{key}' already present in fix folder")]
    AlreadyInFix { key: String },

    /// Retryable filesystem error; does not add the book to `failed_books`.
    #[error("transient filesystem error for '{key}': {source}")]
    TransientFs {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// PID file unwritable, config unusable, or other unrecoverable startup
    /// failure. Route: write the sentinel file and exit non-zero.
    #[error("fatal process error: {0}")]
    FatalProcess(String),
}

impl OrchestratorError {
    /// Whether this error should add the book's key to `failed_books` so it
    /// is skipped on subsequent ticks this session.
    pub fn marks_failed(&self) -> bool {
        !matches!(self, OrchestratorError::TransientFs { .. } | OrchestratorError::BackupMismatch { .. })
    }

    /// Whether this error should move the book directory into `fix_root`.
    pub fn quarantines(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Structural { .. } | OrchestratorError::Conversion { .. }
        )
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            OrchestratorError::Structural { key, .. }
            | OrchestratorError::Conversion { key, .. }
            | OrchestratorError::BackupMismatch { key, .. }
            | OrchestratorError::AlreadyInFix { key }
            | OrchestratorError::TransientFs { key, .. } => Some(key),
            OrchestratorError::BadFile { .. } | OrchestratorError::FatalProcess(_) => None,
        }
    }
}
