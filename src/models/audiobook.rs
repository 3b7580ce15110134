//! The Audiobook model: identity, stage roots, and derived metadata for one
//! candidate directory discovered in the inbox.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::Config;

/// The file format of a book's source audio, as found in the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrigFileType {
    M4b,
    Mp3,
    M4a,
    Wma,
}

impl OrigFileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "m4b" => Some(Self::M4b),
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            "wma" => Some(Self::Wma),
            _ => None,
        }
    }

    /// Whether the converter should remux instead of re-encoding.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::M4a | Self::M4b)
    }
}

/// The closed structural classification of a directory, returned by
/// `core::classifier::classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralKind {
    Flat,
    FlatNested,
    MultiBook,
    MultiDisc,
    MultiNested,
    Mixed,
    Standalone,
    File,
    Empty,
}

/// One of the named filesystem roots a book passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Inbox,
    Backup,
    Merge,
    Build,
    BuildTmp,
    Converted,
    Archive,
    Fix,
}

/// Authoritative tag values for a book, either read from the source or
/// destined to be written to the produced artifact.
#[derive(Debug, Clone, Default)]
pub struct Id3Info {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub narrator: Option<String>,
    pub comment: Option<String>,
    pub has_embedded_cover: bool,
}

/// A candidate book directory, tracked through the pipeline state machine.
#[derive(Debug, Clone)]
pub struct Audiobook {
    /// Stable identifier: the inbox-relative basename.
    pub key: String,
    pub basename: String,
    roots: [PathBuf; 8],
    pub active_stage: Stage,
    pub orig_file_type: Option<OrigFileType>,
    pub audio_files: Vec<PathBuf>,
    pub id3: Id3Info,
    pub bitrate_target: Option<u32>,
    pub samplerate: Option<u32>,
    pub cover_art: Option<PathBuf>,
}

fn stage_index(stage: Stage) -> usize {
    match stage {
        Stage::Inbox => 0,
        Stage::Backup => 1,
        Stage::Merge => 2,
        Stage::Build => 3,
        Stage::BuildTmp => 4,
        Stage::Converted => 5,
        Stage::Archive => 6,
        Stage::Fix => 7,
    }
}

impl Audiobook {
    /// Construct from an inbox path plus the process configuration. Stage
    /// roots are computed by simple concatenation; nothing is created on
    /// disk yet (stage roots are created lazily on first write).
    pub fn new(inbox_path: &Path, config: &Config) -> Self {
        let basename = inbox_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let roots = [
            config.directories.inbox_dir.join(&basename),
            config.directories.backup_dir.join(&basename),
            config.directories.merge_dir.join(&basename),
            config.directories.build_dir.join(&basename),
            config.directories.build_dir.join(format!("{basename}.tmp")),
            config.directories.converted_dir.join(&basename),
            config.directories.archive_dir.join(&basename),
            config.directories.fix_dir.join(&basename),
        ];

        Self {
            key: basename.clone(),
            basename,
            roots,
            active_stage: Stage::Inbox,
            orig_file_type: None,
            audio_files: Vec::new(),
            id3: Id3Info::default(),
            bitrate_target: None,
            samplerate: None,
            cover_art: None,
        }
    }

    pub fn root(&self, stage: Stage) -> &Path {
        &self.roots[stage_index(stage)]
    }

    pub fn active_root(&self) -> &Path {
        self.root(self.active_stage)
    }

    pub fn set_active_dir(&mut self, stage: Stage) {
        self.active_stage = stage;
    }

    /// Path of the artifact this book will eventually publish as.
    pub fn target_m4b(&self) -> PathBuf {
        self.root(Stage::Converted).join(format!("{}.m4b", self.basename))
    }

    pub fn build_file(&self) -> PathBuf {
        self.root(Stage::Build).join(format!("{}.m4b", self.basename))
    }

    pub fn log_path(&self) -> PathBuf {
        self.active_root().join(format!("{}.log", self.basename))
    }

    /// Count audio files physically present under the given stage root.
    pub fn num_files(&self, stage: Stage) -> usize {
        let root = self.root(stage);
        if !root.exists() {
            return 0;
        }
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| is_audio_ext(e.path()))
            .count()
    }

    /// Total byte size of audio files under the given stage root.
    pub fn size(&self, stage: Stage) -> u64 {
        let root = self.root(stage);
        if !root.exists() {
            return 0;
        }
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok().map(|m| m.len()))
            .sum()
    }

    /// Append newline-terminated lines to the per-book log under the
    /// currently active stage root.
    pub fn write_log(&self, msg: &str) -> Result<()> {
        let path = self.log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening book log {}", path.display()))?;
        writeln!(file, "{msg}").context("writing book log line")
    }

    /// Derive a filesystem-title guess from the basename, stripping common
    /// release noise like " (Unabridged)" or " [mp3]".
    pub fn extract_path_info(&self) -> String {
        strip_release_noise(&self.basename)
    }

    /// Populate `id3`, `bitrate_target`, and `samplerate` from the first
    /// audio file's tags plus an `ffprobe` pass, per the Metadata Extractor.
    pub async fn extract_metadata(&mut self, ffprobe_path: &str) -> Result<(), super::OrchestratorError> {
        crate::audio::metadata::derive(self, ffprobe_path).await
    }
}

fn is_audio_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| OrigFileType::from_extension(e).is_some())
        .unwrap_or(false)
}

/// Strip trailing release-noise suffixes from a basename, e.g.
/// "My Book (Unabridged) [mp3]" -> "My Book".
pub fn strip_release_noise(basename: &str) -> String {
    let noise_patterns = [
        r"(?i)\s*\(unabridged\)",
        r"(?i)\s*\[unabridged\]",
        r"(?i)\s*\[mp3\]",
        r"(?i)\s*\[m4b\]",
        r"(?i)\s*\[\d+\s*kbps\]",
        r"(?i)\s*\[\d+\s*k\]",
    ];

    let mut result = basename.to_string();
    for pattern in noise_patterns {
        let re = regex::Regex::new(pattern).expect("static regex");
        result = re.replace_all(&result, "").to_string();
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_release_noise() {
        assert_eq!(
            strip_release_noise("The Hobbit (Unabridged) [mp3]"),
            "The Hobbit"
        );
        assert_eq!(strip_release_noise("1984 [64kbps]"), "1984");
        assert_eq!(strip_release_noise("Plain Title"), "Plain Title");
    }

    #[test]
    fn orig_file_type_passthrough() {
        assert!(OrigFileType::M4a.is_passthrough());
        assert!(OrigFileType::M4b.is_passthrough());
        assert!(!OrigFileType::Mp3.is_passthrough());
        assert!(!OrigFileType::Wma.is_passthrough());
    }

    #[test]
    fn stage_roots_are_distinct() {
        let config = Config::default();
        let book = Audiobook::new(Path::new("/inbox/My Book"), &config);
        assert_eq!(book.root(Stage::Inbox), config.directories.inbox_dir.join("My Book"));
        assert_eq!(book.root(Stage::Fix), config.directories.fix_dir.join("My Book"));
        assert_ne!(book.root(Stage::Inbox), book.root(Stage::Merge));
    }
}
