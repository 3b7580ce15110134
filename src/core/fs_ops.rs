//! Small filesystem helpers used by the Pipeline Controller and Scheduler:
//! directory copy/move, cleanup, and emptiness checks.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// How to treat pre-existing destination entries during a copy/move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Leave the existing destination entry untouched.
    SkipSilent,
    /// Replace the existing destination entry.
    OverwriteSilent,
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
pub fn cp_dir(src: &Path, dst: &Path, on_collision: Collision) -> Result<()> {
    std::fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).expect("walkdir yields descendants of src");
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
            continue;
        }

        if target.exists() && on_collision == Collision::SkipSilent {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &target)
            .with_context(|| format!("copying {} to {}", entry.path().display(), target.display()))?;
    }
    Ok(())
}

/// Move `src` to `dst` as a single directory rename when possible, falling
/// back to copy-then-remove across filesystem boundaries.
pub fn mv_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            cp_dir(src, dst, Collision::OverwriteSilent)?;
            std::fs::remove_dir_all(src).with_context(|| format!("removing {}", src.display()))
        }
    }
}

/// Move the contents of `src` into `dst` (which must already exist or will
/// be created), leaving `src` itself in place but empty.
pub fn mv_dir_contents(src: &Path, dst: &Path, on_collision: Collision) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if target.exists() && on_collision == Collision::SkipSilent {
            continue;
        }
        if target.exists() {
            if target.is_dir() {
                std::fs::remove_dir_all(&target)?;
            } else {
                std::fs::remove_file(&target)?;
            }
        }
        std::fs::rename(entry.path(), &target)
            .with_context(|| format!("moving {} to {}", entry.path().display(), target.display()))?;
    }
    Ok(())
}

/// Like `mv_dir_contents`, but only files whose extension (case-insensitive,
/// leading dot) appears in `allowed_exts` are moved; everything else,
/// including subdirectories, is left behind in `src`.
pub fn mv_dir_contents_filtered<S: AsRef<str>>(
    src: &Path,
    dst: &Path,
    on_collision: Collision,
    allowed_exts: &[S],
) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        if !allowed_exts.iter().any(|a| a.as_ref().eq_ignore_ascii_case(&ext)) {
            continue;
        }
        let target = dst.join(entry.file_name());
        if target.exists() && on_collision == Collision::SkipSilent {
            continue;
        }
        if target.exists() {
            std::fs::remove_file(&target)?;
        }
        std::fs::rename(&path, &target)
            .with_context(|| format!("moving {} to {}", path.display(), target.display()))?;
    }
    Ok(())
}

/// Move a single file into a destination directory, keeping its filename.
pub fn mv_file_to_dir(file: &Path, dst_dir: &Path, on_collision: Collision) -> Result<PathBuf> {
    std::fs::create_dir_all(dst_dir)?;
    let target = dst_dir.join(file.file_name().context("file has no name")?);
    if target.exists() && on_collision == Collision::SkipSilent {
        return Ok(target);
    }
    std::fs::rename(file, &target)
        .with_context(|| format!("moving {} to {}", file.display(), target.display()))?;
    Ok(target)
}

/// Remove empty directories directly and recursively under `dir`, leaving
/// `dir` itself (even if it ends up empty).
pub fn rm_all_empty_dirs(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut dirs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().to_path_buf())
        .collect();
    // Remove deepest first so parents become empty in turn.
    dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    for d in dirs {
        if dir_is_empty(&d) {
            let _ = std::fs::remove_dir(&d);
        }
    }
    Ok(())
}

/// True if `dir` doesn't exist or contains no entries.
pub fn dir_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut rd) => rd.next().is_none(),
        Err(_) => true,
    }
}

/// Remove stale per-tick scratch contents from a stage root (merge, build,
/// trash): anything left behind by an interrupted previous run.
pub fn clean_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("removing {}", path.display()))?;
        } else {
            std::fs::remove_file(&path)
                .with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Safety check before a recursive delete of `on_complete = delete`: the
/// directory must contain only audio files and recognised sidecar
/// extensions, nothing unexpected.
pub fn is_ok_to_delete(dir: &Path, other_exts: &[String]) -> bool {
    let audio_exts = ["mp3", "m4a", "m4b", "wma"];
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .all(|e| {
            let ext = e
                .path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| format!(".{}", x.to_lowercase()))
                .unwrap_or_default();
            audio_exts.contains(&ext.trim_start_matches('.'))
                || other_exts.iter().any(|o| o.eq_ignore_ascii_case(&ext))
        })
}

/// Quiescence detection: walk `dir` recursively and return true if any
/// entry's mtime is within `window` seconds of now.
pub fn was_recently_modified(dir: &Path, window: std::time::Duration) -> bool {
    if !dir.exists() {
        return false;
    }
    let now = SystemTime::now();
    WalkDir::new(dir).into_iter().filter_map(|e| e.ok()).any(|entry| {
        entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|mtime| now.duration_since(mtime).ok())
            .map(|age| age < window)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cp_dir_copies_nested_structure() {
        let src = tempdir().unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("a.mp3"), b"x").unwrap();
        fs::write(src.path().join("sub/b.mp3"), b"y").unwrap();

        let dst = tempdir().unwrap();
        let target = dst.path().join("copy");
        cp_dir(src.path(), &target, Collision::OverwriteSilent).unwrap();

        assert!(target.join("a.mp3").exists());
        assert!(target.join("sub/b.mp3").exists());
    }

    #[test]
    fn mv_dir_moves_and_empties_source() {
        let root = tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.mp3"), b"x").unwrap();

        let dst = root.path().join("dst");
        mv_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("a.mp3").exists());
    }

    #[test]
    fn mv_dir_contents_filtered_skips_unlisted_extensions() {
        let root = tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("cover.jpg"), b"x").unwrap();
        fs::write(src.join("source.mp3"), b"y").unwrap();
        fs::create_dir(src.join("sub")).unwrap();

        let dst = root.path().join("dst");
        mv_dir_contents_filtered(&src, &dst, Collision::OverwriteSilent, &[".jpg"]).unwrap();

        assert!(dst.join("cover.jpg").exists());
        assert!(!dst.join("source.mp3").exists());
        assert!(src.join("source.mp3").exists());
        assert!(src.join("sub").exists());
    }

    #[test]
    fn dir_is_empty_true_for_missing_dir() {
        assert!(dir_is_empty(Path::new("/nonexistent/path/xyz")));
    }

    #[test]
    fn is_ok_to_delete_rejects_unexpected_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("notes.pdf"), b"y").unwrap();

        let other_exts = vec![".jpg".to_string(), ".txt".to_string()];
        assert!(!is_ok_to_delete(dir.path(), &other_exts));

        fs::remove_file(dir.path().join("notes.pdf")).unwrap();
        assert!(is_ok_to_delete(dir.path(), &other_exts));
    }

    #[test]
    fn was_recently_modified_detects_fresh_writes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        assert!(was_recently_modified(dir.path(), std::time::Duration::from_secs(60)));
        assert!(!was_recently_modified(dir.path(), std::time::Duration::from_secs(0)));
    }
}
