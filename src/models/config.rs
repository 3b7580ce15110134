//! Watcher configuration, loaded from YAML via `utils::config::ConfigManager`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How to treat a pre-existing converted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    Skip,
    Overwrite,
}

/// What to do with the inbox source after a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnComplete {
    Move,
    Delete,
    TestDoNothing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,
    #[serde(default = "default_converted_dir")]
    pub converted_dir: PathBuf,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_fix_dir")]
    pub fix_dir: PathBuf,
    #[serde(default = "default_merge_dir")]
    pub merge_dir: PathBuf,
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    #[serde(default = "default_trash_dir")]
    pub trash_dir: PathBuf,
}

fn default_inbox_dir() -> PathBuf { PathBuf::from("/media/inbox") }
fn default_converted_dir() -> PathBuf { PathBuf::from("/media/converted") }
fn default_archive_dir() -> PathBuf { PathBuf::from("/media/archive") }
fn default_backup_dir() -> PathBuf { PathBuf::from("/media/backup") }
fn default_fix_dir() -> PathBuf { PathBuf::from("/media/fix") }
fn default_merge_dir() -> PathBuf { PathBuf::from("/media/merge") }
fn default_build_dir() -> PathBuf { PathBuf::from("/media/build") }
fn default_trash_dir() -> PathBuf { PathBuf::from("/media/trash") }

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            converted_dir: default_converted_dir(),
            archive_dir: default_archive_dir(),
            backup_dir: default_backup_dir(),
            fix_dir: default_fix_dir(),
            merge_dir: default_merge_dir(),
            build_dir: default_build_dir(),
            trash_dir: default_trash_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: u32,
    #[serde(default = "default_sleeptime")]
    pub sleeptime_secs: u64,
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: u64,
}

fn default_cpu_cores() -> u32 {
    std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(2)
}
fn default_sleeptime() -> u64 { 10 }
fn default_wait_time() -> u64 { 60 }

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cpu_cores: default_cpu_cores(),
            sleeptime_secs: default_sleeptime(),
            wait_time_secs: default_wait_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_true")]
    pub make_backup: bool,
    #[serde(default = "default_overwrite_mode")]
    pub overwrite_mode: OverwriteMode,
    #[serde(default = "default_on_complete")]
    pub on_complete: OnComplete,
    #[serde(default)]
    pub match_filter: Option<String>,
    #[serde(default)]
    pub no_fix: bool,
    #[serde(default)]
    pub multi_disc_enabled: bool,
}

fn default_true() -> bool { true }
fn default_overwrite_mode() -> OverwriteMode { OverwriteMode::Skip }
fn default_on_complete() -> OnComplete { OnComplete::Move }

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            make_backup: default_true(),
            overwrite_mode: default_overwrite_mode(),
            on_complete: default_on_complete(),
            match_filter: None,
            no_fix: false,
            multi_disc_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    #[serde(default)]
    pub skip_covers: bool,
    #[serde(default)]
    pub use_filenames_as_chapters: bool,
    #[serde(default = "default_other_exts")]
    pub other_exts: Vec<String>,
}

fn default_other_exts() -> Vec<String> {
    vec![".jpg".into(), ".jpeg".into(), ".png".into(), ".txt".into()]
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            skip_covers: false,
            use_filenames_as_chapters: false,
            other_exts: default_other_exts(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub no_ascii: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default = "default_merge_tool_path")]
    pub merge_tool_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

fn default_merge_tool_path() -> String { "m4b-tool".to_string() }
fn default_ffprobe_path() -> String { "ffprobe".to_string() }

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            merge_tool_path: default_merge_tool_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub directories: DirectoryConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let reloaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.directories.inbox_dir, config.directories.inbox_dir);
        assert_eq!(reloaded.processing.overwrite_mode, config.processing.overwrite_mode);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let yaml = "directories:\n  inbox_dir: /tmp/inbox\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.directories.inbox_dir, PathBuf::from("/tmp/inbox"));
        assert_eq!(config.directories.converted_dir, default_converted_dir());
        assert_eq!(config.processing.on_complete, OnComplete::Move);
    }
}
