//! Outer watch loop: one tick every `sleeptime` seconds.

use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::core::fs_ops::was_recently_modified;
use crate::core::pipeline::{self, Outcome};
use crate::core::runlog::{self, RunResult};
use crate::core::scanner;
use crate::core::state::{match_filter_regex, WatcherState};
use crate::models::{Audiobook, Config};

pub struct Scheduler {
    config: Config,
    state: WatcherState,
    first_run: bool,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        let pid_file = config.directories.inbox_dir.join(".auto-m4b.pid");
        let fatal_file = config.directories.inbox_dir.join(".auto-m4b.fatal");
        let state = WatcherState::new(pid_file, fatal_file);
        Self { config, state, first_run: true }
    }

    /// Run the watch loop forever, sleeping `runtime.sleeptime_secs` between
    /// ticks. Returns only on a fatal error.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if let Err(err) = self.tick().await {
                let _ = self.state.write_fatal_sentinel(&err.to_string());
                anyhow::bail!(err);
            }
            tokio::time::sleep(Duration::from_secs(self.config.runtime.sleeptime_secs)).await;
        }
    }

    /// One scheduler tick: books within the tick are awaited sequentially,
    /// never interleaved, per the single-threaded cooperative scheduling
    /// model.
    async fn tick(&mut self) -> Result<(), crate::models::OrchestratorError> {
        let inbox = self.config.directories.inbox_dir.clone();

        self.state.claim_pid_file(&inbox)?;

        let total_audio = scanner::count_audio_files(&inbox);
        if total_audio == 0 {
            if self.first_run {
                info!("watching for new books in {}", inbox.display());
            }
            self.first_run = false;
            return Ok(());
        }

        let current_mtime = std::fs::metadata(&inbox).ok().and_then(|m| m.modified().ok());
        if let (Some(last), Some(current)) = (self.state.last_inbox_mtime, current_mtime) {
            if last == current {
                return Ok(());
            }
        }
        self.state.last_inbox_mtime = current_mtime;

        let wait_window = Duration::from_secs(self.config.runtime.wait_time_secs);
        if was_recently_modified(&inbox, wait_window) {
            info!("inbox recently modified, waiting in case files are still being copied");
            return Ok(());
        }

        for file in scanner::standalone_files(&inbox) {
            if let Err(e) = pipeline::promote_standalone(&file, &self.config) {
                warn!(file = %file.display(), error = %e, "failed to promote standalone file");
            }
        }

        let candidates = scanner::candidate_book_dirs(&inbox);
        let filter = match_filter_regex(&self.config.processing.match_filter);
        let candidates = scanner::apply_match_filter(candidates, filter.as_ref());

        if candidates.is_empty() {
            self.first_run = false;
            return Ok(());
        }

        info!("found {} book(s) to convert", candidates.len());

        for dir in candidates {
            let key = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if self.state.is_failed(&key) {
                continue;
            }
            if was_recently_modified(&dir, wait_window) {
                info!(book = %key, "skipping, recently updated and may still be copying");
                continue;
            }

            let mut book = Audiobook::new(&dir, &self.config);
            let started = std::time::Instant::now();
            let outcome = pipeline::run(&mut book, &self.config).await;
            let elapsed = started.elapsed().as_secs();

            let log_path = self.config.directories.inbox_dir.join("auto-m4b.log");
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

            match outcome {
                Outcome::Published => {
                    let _ = runlog::append(&log_path, &timestamp, &key, RunResult::Success, Some(elapsed));
                }
                Outcome::Quarantined | Outcome::Failed => {
                    self.state.mark_failed(&key);
                    let _ = runlog::append(&log_path, &timestamp, &key, RunResult::Failed, None);
                }
                Outcome::Retry | Outcome::Skipped => {}
            }
        }

        let _ = crate::core::fs_ops::clean_dir(&self.config.directories.merge_dir);
        let _ = crate::core::fs_ops::clean_dir(&self.config.directories.build_dir);
        let _ = crate::core::fs_ops::clean_dir(&self.config.directories.trash_dir);

        self.first_run = false;
        Ok(())
    }
}
