//! Inbox directory discovery: count audio files, find candidate book
//! directories, apply the match filter.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::classifier::base_dirs_with_audio;

/// Count audio files anywhere under `dir`, recursively.
pub fn count_audio_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| crate::models::OrigFileType::from_extension(x).is_some())
                .unwrap_or(false)
        })
        .count()
}

/// Audio files sitting directly (depth 0) under `dir`.
pub fn standalone_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|x| x.to_str())
                    .map(|x| crate::models::OrigFileType::from_extension(x).is_some())
                    .unwrap_or(false)
        })
        .collect()
}

/// Candidate book directories directly under `inbox` (mindepth=1), in
/// natural order.
pub fn candidate_book_dirs(inbox: &Path) -> Vec<PathBuf> {
    let mut dirs = base_dirs_with_audio(inbox, 1, 1);
    crate::utils::sorting::natural_sort(&mut dirs);
    dirs
}

/// Apply an optional basename match filter.
pub fn apply_match_filter(dirs: Vec<PathBuf>, filter: Option<&Regex>) -> Vec<PathBuf> {
    match filter {
        None => dirs,
        Some(re) => dirs
            .into_iter()
            .filter(|d| d.file_name().map(|n| re.is_match(&n.to_string_lossy())).unwrap_or(false))
            .collect(),
    }
}
