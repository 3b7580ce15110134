//! Path Classifier — given a directory, returns its structural kind and the
//! canonical ordered list of audio files it contains.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use walkdir::WalkDir;

use crate::models::{OrigFileType, StructuralKind};
use crate::utils::sorting::natural_sort;

fn is_allowed_audio_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| OrigFileType::from_extension(e).is_some())
            .unwrap_or(false)
}

fn root_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_allowed_audio_file(&path) {
            files.push(path);
        }
    }
    natural_sort(&mut files);
    Ok(files)
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_contains_audio(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| is_allowed_audio_file(e.path()))
}

fn subdirs_with_audio(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(subdirs(dir)?.into_iter().filter(|d| dir_contains_audio(d)).collect())
}

fn disc_pattern() -> Regex {
    Regex::new(r"(?i)^(disc\s*\d+|cd\s*\d+)").expect("static regex")
}

fn looks_like_disc_dir(name: &str) -> bool {
    disc_pattern().is_match(name.trim())
}

fn common_prefix_len(names: &[String]) -> usize {
    if names.is_empty() {
        return 0;
    }
    let first = &names[0];
    let mut len = first.len();
    for name in &names[1..] {
        len = first
            .chars()
            .zip(name.chars())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count()
            .min(len);
    }
    len
}

fn all_share_common_prefix(dirs: &[PathBuf]) -> bool {
    let names: Vec<String> = dirs
        .iter()
        .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    if names.len() < 2 {
        return true;
    }
    common_prefix_len(&names) > 0
}

fn is_plausible_book_dir(dir: &Path, parent_name: &str) -> bool {
    let file_count = root_files(dir).map(|f| f.len()).unwrap_or(0);
    let name_ok = dir
        .file_name()
        .map(|n| n.to_string_lossy() != parent_name)
        .unwrap_or(false);
    file_count >= 2 && name_ok
}

/// Classify a directory per the structural kind rules. Returns the kind and
/// the canonical naturally-ordered list of top-level audio files (for `flat`
/// and `standalone` kinds) or an empty list otherwise — callers needing the
/// full file set for other kinds should use `base_dirs_with_audio`.
pub fn classify(dir: &Path) -> Result<(StructuralKind, Vec<PathBuf>)> {
    if dir.is_file() {
        return Ok(if is_allowed_audio_file(dir) {
            (StructuralKind::File, vec![dir.to_path_buf()])
        } else {
            (StructuralKind::Empty, Vec::new())
        });
    }

    if !dir.is_dir() || !dir_contains_audio(dir) {
        return Ok((StructuralKind::Empty, Vec::new()));
    }

    let root = root_files(dir)?;
    let nested = subdirs_with_audio(dir)?;

    if !root.is_empty() && nested.is_empty() {
        if root.len() == 1 {
            return Ok((StructuralKind::Standalone, root));
        }
        return Ok((StructuralKind::Flat, root));
    }

    if root.is_empty() && nested.len() == 1 {
        let (inner_kind, inner_files) = classify(&nested[0])?;
        if inner_kind == StructuralKind::Flat {
            return Ok((StructuralKind::FlatNested, inner_files));
        }
    }

    if !root.is_empty() && !nested.is_empty() {
        return Ok((StructuralKind::Mixed, root));
    }

    if root.is_empty() && nested.len() >= 2 {
        let parent_name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let all_disc_shaped = nested.iter().all(|d| {
            d.file_name()
                .map(|n| looks_like_disc_dir(&n.to_string_lossy()))
                .unwrap_or(false)
        }) && all_share_common_prefix(&nested);

        if all_disc_shaped {
            return Ok((StructuralKind::MultiDisc, Vec::new()));
        }

        let all_plausible_books = nested.iter().all(|d| is_plausible_book_dir(d, &parent_name));
        if all_plausible_books {
            return Ok((StructuralKind::MultiBook, Vec::new()));
        }

        return Ok((StructuralKind::MultiNested, Vec::new()));
    }

    Ok((StructuralKind::Empty, Vec::new()))
}

/// Return the minimal set of directories that directly contain an allowed
/// audio file, constrained by the given depth window (relative to `dir`,
/// `mindepth` and `maxdepth` both inclusive, `mindepth >= 1` to exclude
/// `dir` itself).
pub fn base_dirs_with_audio(dir: &Path, mindepth: usize, maxdepth: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(mindepth).max_depth(maxdepth) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        let has_direct_audio = std::fs::read_dir(entry.path())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .any(|e| is_allowed_audio_file(&e.path()))
            })
            .unwrap_or(false);
        if has_direct_audio {
            found.push(entry.path().to_path_buf());
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"fake audio").unwrap();
    }

    #[test]
    fn flat_book_is_classified_flat() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("01.mp3"));
        touch(&dir.path().join("02.mp3"));
        let (kind, files) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::Flat);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn single_file_is_standalone() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("whole_book.mp3"));
        let (kind, _) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::Standalone);
    }

    #[test]
    fn empty_dir_is_empty() {
        let dir = tempdir().unwrap();
        let (kind, _) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::Empty);
    }

    #[test]
    fn mixed_root_and_nested_is_mixed() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("00.mp3"));
        let sub = dir.path().join("extra");
        fs::create_dir(&sub).unwrap();
        touch(&sub.join("01.mp3"));
        let (kind, _) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::Mixed);
    }

    #[test]
    fn single_nested_flat_subdir_is_flat_nested() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("Disc");
        fs::create_dir(&sub).unwrap();
        touch(&sub.join("01.mp3"));
        touch(&sub.join("02.mp3"));
        let (kind, files) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::FlatNested);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn disc_shaped_subdirs_are_multi_disc() {
        let dir = tempdir().unwrap();
        for n in 1..=3 {
            let sub = dir.path().join(format!("Disc {n}"));
            fs::create_dir(&sub).unwrap();
            touch(&sub.join("01.mp3"));
        }
        let (kind, _) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::MultiDisc);
    }

    #[test]
    fn distinct_titled_subdirs_are_multi_book() {
        let dir = tempdir().unwrap();
        let book_a = dir.path().join("The Hobbit");
        fs::create_dir(&book_a).unwrap();
        touch(&book_a.join("01.mp3"));
        touch(&book_a.join("02.mp3"));
        let book_b = dir.path().join("1984");
        fs::create_dir(&book_b).unwrap();
        touch(&book_b.join("01.mp3"));
        touch(&book_b.join("02.mp3"));
        let (kind, _) = classify(dir.path()).unwrap();
        assert_eq!(kind, StructuralKind::MultiBook);
    }

    #[test]
    fn base_dirs_with_audio_finds_nested_book_dirs() {
        let dir = tempdir().unwrap();
        let book_a = dir.path().join("BookA");
        fs::create_dir(&book_a).unwrap();
        touch(&book_a.join("01.mp3"));
        let book_b = dir.path().join("BookB");
        fs::create_dir(&book_b).unwrap();
        touch(&book_b.join("01.mp3"));

        let found = base_dirs_with_audio(dir.path(), 1, 1);
        assert_eq!(found.len(), 2);
    }
}
