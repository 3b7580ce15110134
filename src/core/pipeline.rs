//! Pipeline Controller — drives a single book through
//! received → validated → backed_up → staged → built → tagged → published,
//! with quarantine/skip side branches.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::audio::converter;
use crate::audio::error_interpreter::ConverterOutcome;
use crate::audio::metadata::{self, TagKey, TagValue};
use crate::core::classifier::{self, classify};
use crate::core::fs_ops::{self, Collision};
use crate::models::{Audiobook, Config, OrchestratorError, Stage, StructuralKind};
use crate::utils::sorting::roman_numerals_affect_order;

/// Terminal disposition of a pipeline run for one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Published,
    Quarantined,
    Skipped,
    /// Transient problem (backup mismatch, filesystem hiccup): not added to
    /// `failed_books`, not logged as a `FAILED` row, eligible on the next tick.
    Retry,
    Failed,
}

/// Extensions moved from the build root into the converted dir; everything
/// else left in the build dir by the merge tool is scratch, not output.
const AUDIO_EXTS: [&str; 4] = [".mp3", ".m4a", ".m4b", ".wma"];

/// Run the full pipeline for a single book, already known to have audio
/// files directly or via a single flattenable subdirectory under
/// `inbox_root`. Awaited sequentially by the scheduler, one book at a time.
pub async fn run(book: &mut Audiobook, config: &Config) -> Outcome {
    match run_inner(book, config).await {
        Ok(outcome) => outcome,
        Err(err) => handle_error(book, config, err),
    }
}

async fn run_inner(book: &mut Audiobook, config: &Config) -> Result<Outcome, OrchestratorError> {
    if let Some(outcome) = received(book, config)? {
        return Ok(outcome);
    }

    if let Some(outcome) = backed_up(book, config)? {
        return Ok(outcome);
    }

    staged(book, config).await?;

    let elapsed = built(book, config).await?;

    tagged(book)?;

    published(book, config, elapsed)
}

/// received → validated / quarantined(fixable) / skipped.
fn received(book: &mut Audiobook, config: &Config) -> Result<Option<Outcome>, OrchestratorError> {
    book.set_active_dir(Stage::Inbox);

    if book.root(Stage::Fix).exists() {
        return Err(OrchestratorError::AlreadyInFix { key: book.key.clone() });
    }

    let (kind, mut files) = classify(book.root(Stage::Inbox)).map_err(|e| OrchestratorError::Structural {
        key: book.key.clone(),
        reason: e.to_string(),
    })?;

    match kind {
        StructuralKind::MultiNested | StructuralKind::Mixed => {
            let _ = book.write_log(
                "This book contains multiple folders with audio files - maybe it is a multi-disc book, or maybe it is multiple books? All files must be in a single folder, named alphabetically in the correct order.",
            );
            return Err(OrchestratorError::Structural {
                key: book.key.clone(),
                reason: "multiple folders with audio files".to_string(),
            });
        }
        StructuralKind::MultiDisc => {
            if !config.processing.multi_disc_enabled {
                return Err(OrchestratorError::Structural {
                    key: book.key.clone(),
                    reason: "multi-disc layout not supported".to_string(),
                });
            }
            flatten_multi_disc(book)?;
            let (_, flattened) = classify(book.root(Stage::Inbox)).map_err(|e| OrchestratorError::Structural {
                key: book.key.clone(),
                reason: e.to_string(),
            })?;
            files = flattened;
        }
        StructuralKind::Empty => {
            let _ = book.write_log("No audio files found in this folder");
            return Ok(Some(Outcome::Skipped));
        }
        StructuralKind::FlatNested => {
            flatten_single_subdir(book)?;
        }
        _ => {}
    }

    let filenames: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    if roman_numerals_affect_order(&filenames) {
        let _ = book.write_log(
            "Some of this book's files appear to be named with roman numerals. Roman numerals do not sort in alphabetical order; please make sure files are named alphabetically in the correct order.",
        );
        return Err(OrchestratorError::Structural {
            key: book.key.clone(),
            reason: "roman numerals affect file order".to_string(),
        });
    }

    book.orig_file_type = files
        .first()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(crate::models::OrigFileType::from_extension);
    book.audio_files = files;

    Ok(None)
}

fn flatten_single_subdir(book: &Audiobook) -> Result<(), OrchestratorError> {
    let inbox = book.root(Stage::Inbox);
    let subdirs = classifier::base_dirs_with_audio(inbox, 1, 1);
    if let Some(subdir) = subdirs.into_iter().next() {
        fs_ops::mv_dir_contents(&subdir, inbox, Collision::SkipSilent).map_err(|e| {
            OrchestratorError::Structural { key: book.key.clone(), reason: e.to_string() }
        })?;
        let _ = fs_ops::rm_all_empty_dirs(inbox);
    }
    Ok(())
}

/// Flatten a `Disc 1/01.mp3 … Disc 5/04.mp3` layout into a single flat book,
/// renaming each file to `Disc NN - NN - <original stem>.<ext>` so natural
/// order across discs matches playback order.
fn flatten_multi_disc(book: &Audiobook) -> Result<(), OrchestratorError> {
    let inbox = book.root(Stage::Inbox);

    let mut discs: Vec<std::path::PathBuf> = std::fs::read_dir(inbox)
        .map_err(|e| OrchestratorError::Structural { key: book.key.clone(), reason: e.to_string() })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    crate::utils::sorting::natural_sort(&mut discs);

    for (disc_idx, disc_dir) in discs.iter().enumerate() {
        for (track_idx, file) in audio_files_in(disc_dir).iter().enumerate() {
            let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("mp3");
            let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            let target = inbox.join(format!("Disc {:02} - {:02} - {stem}.{ext}", disc_idx + 1, track_idx + 1));
            std::fs::rename(file, &target).map_err(|e| OrchestratorError::Structural {
                key: book.key.clone(),
                reason: format!("flattening multi-disc layout: {e}"),
            })?;
        }
    }

    let _ = fs_ops::rm_all_empty_dirs(inbox);
    Ok(())
}

fn audio_files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .map(|e| crate::models::OrigFileType::from_extension(e).is_some())
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    crate::utils::sorting::natural_sort(&mut files);
    files
}

/// validated → backed_up.
fn backed_up(book: &Audiobook, config: &Config) -> Result<Option<Outcome>, OrchestratorError> {
    if !config.processing.make_backup {
        return Ok(None);
    }
    if fs_ops::dir_is_empty(book.root(Stage::Inbox)) {
        return Ok(None);
    }

    fs_ops::cp_dir(book.root(Stage::Inbox), book.root(Stage::Backup), Collision::SkipSilent)
        .map_err(|e| OrchestratorError::TransientFs {
            key: book.key.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

    let orig_count = book.num_files(Stage::Inbox);
    let orig_size = book.size(Stage::Inbox);
    let backup_count = book.num_files(Stage::Backup);
    let backup_size = book.size(Stage::Backup);

    let exact = orig_count == backup_count && orig_size == backup_size;
    let larger_dest = orig_count < backup_count || orig_size < backup_size;
    let fuzzy = orig_count == backup_count
        && (orig_size as i64 - backup_size as i64).unsigned_abs() < 1000;

    if exact || larger_dest || fuzzy {
        Ok(None)
    } else {
        Err(OrchestratorError::BackupMismatch {
            key: book.key.clone(),
            reason: format!(
                "expected {orig_count} files ({orig_size}B), found {backup_count} files ({backup_size}B)"
            ),
        })
    }
}

/// backed_up → staged.
async fn staged(book: &mut Audiobook, config: &Config) -> Result<(), OrchestratorError> {
    fs_ops::cp_dir(book.root(Stage::Inbox), book.root(Stage::Merge), Collision::OverwriteSilent)
        .map_err(|e| OrchestratorError::TransientFs {
            key: book.key.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

    let _ = fs_ops::clean_dir(book.root(Stage::Build));
    let _ = fs_ops::clean_dir(book.root(Stage::BuildTmp));

    book.set_active_dir(Stage::Merge);

    let (_, merged_files) = classify(book.root(Stage::Merge)).map_err(|e| OrchestratorError::Structural {
        key: book.key.clone(),
        reason: e.to_string(),
    })?;
    if !merged_files.is_empty() {
        book.audio_files = merged_files;
    }

    book.extract_metadata(&config.advanced.ffprobe_path).await?;

    Ok(())
}

/// staged → built.
async fn built(book: &mut Audiobook, config: &Config) -> Result<Duration, OrchestratorError> {
    book.set_active_dir(Stage::Build);
    let started = Instant::now();

    let outcome = converter::run(book, config).await.map_err(|e| OrchestratorError::Conversion {
        key: book.key.clone(),
        reason: e.to_string(),
    })?;

    let elapsed = started.elapsed();

    match outcome {
        ConverterOutcome::Success => Ok(elapsed),
        ConverterOutcome::Failed(reason) => {
            let _ = book.write_log(&reason);
            Err(OrchestratorError::Conversion { key: book.key.clone(), reason })
        }
    }
}

/// built → tagged.
fn tagged(book: &mut Audiobook) -> Result<(), OrchestratorError> {
    let built_file = book.build_file();
    metadata::write_tags(
        &built_file,
        &[
            (TagKey::Title, TagValue::Text(book.id3.title.clone().unwrap_or_else(|| book.extract_path_info()))),
            (TagKey::Artist, book.id3.author.clone().map(TagValue::Text).unwrap_or(TagValue::Text(String::new()))),
        ]
        .into_iter()
        .filter(|(_, v)| !matches!(v, TagValue::Text(s) if s.is_empty()))
        .collect::<Vec<_>>(),
    )?;
    Ok(())
}

/// Name of the per-book description sidecar, e.g. "My Book [44kHz].txt".
fn description_filename(book: &Audiobook) -> String {
    let khz = book.samplerate.unwrap_or(44_100) / 1000;
    format!("{} [{khz}kHz].txt", book.basename)
}

/// Write a fresh description sidecar into `dir`, summarizing the source
/// file count and the bitrate/samplerate the conversion targeted.
fn write_description_file(book: &Audiobook, dir: &Path) -> Result<std::path::PathBuf, OrchestratorError> {
    let path = dir.join(description_filename(book));
    let title = book.id3.title.clone().unwrap_or_else(|| book.extract_path_info());
    let content = format!(
        "{title}\n{} source file(s)\n{}kbps / {}Hz\n",
        book.audio_files.len(),
        book.bitrate_target.unwrap_or(64),
        book.samplerate.unwrap_or(44_100),
    );
    std::fs::write(&path, content).map_err(|e| OrchestratorError::TransientFs { key: book.key.clone(), source: e })?;
    Ok(path)
}

/// Remove stale `"<basename> [...].txt"` description files left behind in
/// earlier stage roots by a previous run, keeping only `keep`.
fn sweep_stale_description_files(book: &Audiobook, keep: &Path) {
    let prefix = format!("{} [", book.basename);
    for root in [book.root(Stage::Build), book.root(Stage::Merge), book.root(Stage::Converted)] {
        let Ok(rd) = std::fs::read_dir(root) else { continue };
        for entry in rd.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path == keep {
                continue;
            }
            let is_stale_desc = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".txt"))
                .unwrap_or(false);
            if is_stale_desc {
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

/// tagged → published, plus the post-publish on_complete action.
fn published(book: &mut Audiobook, config: &Config, elapsed: Duration) -> Result<Outcome, OrchestratorError> {
    // Written while `active_stage` is still `Build`, so it lands in the
    // build-stage log that gets renamed into the converted dir below.
    let _ = book.write_log(&format!("Converted in {}s", elapsed.as_secs()));

    let converted_dir = book.root(Stage::Converted).to_path_buf();
    std::fs::create_dir_all(&converted_dir).map_err(|e| OrchestratorError::TransientFs {
        key: book.key.clone(),
        source: e,
    })?;

    let desc_file = write_description_file(book, &converted_dir)?;
    sweep_stale_description_files(book, &desc_file);

    let build_log = book.log_path();
    if build_log.is_file() {
        let renamed_log = converted_dir.join(format!("m4b-tool.{}.log", book.key));
        let _ = std::fs::remove_file(&renamed_log);
        std::fs::rename(&build_log, &renamed_log).map_err(|e| OrchestratorError::TransientFs {
            key: book.key.clone(),
            source: e,
        })?;
    }

    fs_ops::mv_dir_contents_filtered(
        book.root(Stage::Merge),
        &converted_dir,
        Collision::OverwriteSilent,
        &config.converter.other_exts,
    )
    .map_err(|e| OrchestratorError::TransientFs {
        key: book.key.clone(),
        source: std::io::Error::other(e.to_string()),
    })?;

    let _ = fs_ops::rm_all_empty_dirs(book.root(Stage::Build));
    fs_ops::mv_dir_contents_filtered(book.root(Stage::Build), &converted_dir, Collision::OverwriteSilent, &AUDIO_EXTS)
        .map_err(|e| OrchestratorError::TransientFs {
            key: book.key.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

    book.set_active_dir(Stage::Converted);

    if !book.target_m4b().is_file() {
        return Err(OrchestratorError::Conversion {
            key: book.key.clone(),
            reason: "output file does not exist".to_string(),
        });
    }

    // The merge tool's own generic description.txt is redundant once our
    // named sidecar has been written above.
    let generic_desc = converted_dir.join("description.txt");
    let _ = std::fs::remove_file(&generic_desc);

    let _ = fs_ops::clean_dir(book.root(Stage::Merge));
    let _ = fs_ops::clean_dir(book.root(Stage::Build));

    apply_on_complete(book, config)?;

    info!(book = %book.key, "published");
    Ok(Outcome::Published)
}

fn apply_on_complete(book: &Audiobook, config: &Config) -> Result<(), OrchestratorError> {
    use crate::models::OnComplete;
    match config.processing.on_complete {
        OnComplete::Move => {
            fs_ops::mv_dir_contents(book.root(Stage::Inbox), book.root(Stage::Archive), Collision::OverwriteSilent)
                .map_err(|e| OrchestratorError::TransientFs {
                    key: book.key.clone(),
                    source: std::io::Error::other(e.to_string()),
                })?;
            if book.root(Stage::Inbox).exists() {
                warn!(book = %book.key, "inbox directory still exists after archiving");
            }
        }
        OnComplete::Delete => {
            if fs_ops::is_ok_to_delete(book.root(Stage::Inbox), &config.converter.other_exts) {
                let _ = std::fs::remove_dir_all(book.root(Stage::Inbox));
            }
        }
        OnComplete::TestDoNothing => {}
    }
    Ok(())
}

fn handle_error(book: &mut Audiobook, config: &Config, err: OrchestratorError) -> Outcome {
    let key = book.key.clone();
    warn!(book = %key, error = %err, "pipeline error");

    if matches!(err, OrchestratorError::AlreadyInFix { .. }) {
        return Outcome::Skipped;
    }

    if err.quarantines() {
        quarantine(book, config, &err.to_string());
        return Outcome::Quarantined;
    }

    if !err.marks_failed() {
        return Outcome::Retry;
    }

    Outcome::Failed
}

fn quarantine(book: &mut Audiobook, config: &Config, reason: &str) {
    let _ = book.write_log(reason);
    if config.processing.no_fix {
        let _ = book.write_log("(This book would have been moved to fix folder, but no_fix is enabled)");
        return;
    }
    if fs_ops::mv_dir(book.root(Stage::Inbox), book.root(Stage::Fix)).is_ok() {
        book.set_active_dir(Stage::Fix);
    }
}

/// Move a standalone audio file found directly in the inbox into its own
/// subfolder; `.m4b` files short-circuit straight to `converted_dir` with
/// `(copy)`/`(copy N)` disambiguation.
pub fn promote_standalone(file: &Path, config: &Config) -> Result<()> {
    let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");

    if ext.eq_ignore_ascii_case("m4b") {
        let target = unique_copy_target(&config.directories.converted_dir, &stem, ext);
        std::fs::create_dir_all(&config.directories.converted_dir)?;
        std::fs::rename(file, &target)?;
    } else {
        let folder = config.directories.inbox_dir.join(&stem);
        std::fs::create_dir_all(&folder)?;
        fs_ops::mv_file_to_dir(file, &folder, Collision::OverwriteSilent)?;
    }
    Ok(())
}

fn unique_copy_target(dir: &Path, stem: &str, ext: &str) -> std::path::PathBuf {
    let plain = dir.join(format!("{stem}.{ext}"));
    if !plain.exists() {
        return plain;
    }
    let first_copy = dir.join(format!("{stem} (copy).{ext}"));
    if !first_copy.exists() {
        return first_copy;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem} (copy {n}).{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn unique_copy_target_disambiguates_collisions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("book.m4b"), b"x").unwrap();
        let first = unique_copy_target(dir.path(), "book", "m4b");
        assert_eq!(first, dir.path().join("book (copy).m4b"));

        fs::write(&first, b"x").unwrap();
        let second = unique_copy_target(dir.path(), "book", "m4b");
        assert_eq!(second, dir.path().join("book (copy 1).m4b"));
    }

    #[test]
    fn promote_standalone_non_m4b_gets_its_own_folder() {
        let config = Config::default();
        let inbox = tempdir().unwrap();
        let mut config = config;
        config.directories.inbox_dir = inbox.path().to_path_buf();
        let file = inbox.path().join("lonely.mp3");
        fs::write(&file, b"x").unwrap();

        promote_standalone(&file, &config).unwrap();
        assert!(inbox.path().join("lonely").join("lonely.mp3").exists());
    }

    #[tokio::test]
    async fn multi_disc_is_quarantined_unless_enabled() {
        let mut config = Config::default();
        let inbox = tempdir().unwrap();
        config.directories.inbox_dir = inbox.path().to_path_buf();
        config.directories.fix_dir = tempdir().unwrap().path().to_path_buf();

        let book_dir = inbox.path().join("The Hobbit");
        for n in 1..=2 {
            let disc = book_dir.join(format!("Disc {n}"));
            fs::create_dir_all(&disc).unwrap();
            fs::write(disc.join("01.mp3"), b"x").unwrap();
        }

        let mut book = Audiobook::new(&book_dir, &config);
        let outcome = run(&mut book, &config).await;
        assert_eq!(outcome, Outcome::Quarantined);
    }

    #[test]
    fn multi_disc_enabled_flattens_before_classification() {
        let mut config = Config::default();
        config.processing.multi_disc_enabled = true;
        let inbox = tempdir().unwrap();
        config.directories.inbox_dir = inbox.path().to_path_buf();

        let book_dir = inbox.path().join("The Hobbit");
        for n in 1..=2 {
            let disc = book_dir.join(format!("Disc {n}"));
            fs::create_dir_all(&disc).unwrap();
            fs::write(disc.join("01.mp3"), b"x").unwrap();
        }

        let mut book = Audiobook::new(&book_dir, &config);
        let outcome = received(&mut book, &config).unwrap();
        assert!(outcome.is_none());
        assert_eq!(book.audio_files.len(), 2);
        assert!(book_dir.join("Disc 01 - 01 - 01.mp3").exists());
        assert!(book_dir.join("Disc 02 - 01 - 01.mp3").exists());
    }

    #[test]
    fn handle_error_routes_transient_and_backup_errors_to_retry() {
        let config = Config::default();
        let inbox = tempdir().unwrap();
        let mut book = Audiobook::new(&inbox.path().join("Some Book"), &config);

        let transient = OrchestratorError::TransientFs {
            key: book.key.clone(),
            source: std::io::Error::other("disk hiccup"),
        };
        assert_eq!(handle_error(&mut book, &config, transient), Outcome::Retry);

        let mismatch = OrchestratorError::BackupMismatch { key: book.key.clone(), reason: "size drift".to_string() };
        assert_eq!(handle_error(&mut book, &config, mismatch), Outcome::Retry);
    }

    #[test]
    fn handle_error_still_fails_bad_file_errors() {
        let config = Config::default();
        let inbox = tempdir().unwrap();
        let mut book = Audiobook::new(&inbox.path().join("Some Book"), &config);

        let err = OrchestratorError::BadFile { path: Path::new("track.mp3").to_path_buf(), reason: "corrupt".to_string() };
        assert_eq!(handle_error(&mut book, &config, err), Outcome::Failed);
    }

    #[test]
    fn published_writes_description_file_and_renames_log() {
        let mut config = Config::default();
        let root = tempdir().unwrap();
        config.directories.merge_dir = root.path().join("merge");
        config.directories.build_dir = root.path().join("build");
        config.directories.converted_dir = root.path().join("converted");
        config.processing.on_complete = crate::models::OnComplete::TestDoNothing;

        let mut book = Audiobook::new(Path::new("Some Book"), &config);
        book.samplerate = Some(44_100);
        book.bitrate_target = Some(64);
        book.id3.title = Some("Some Book".to_string());

        fs::create_dir_all(book.root(Stage::Build)).unwrap();
        fs::write(book.build_file(), b"fake m4b").unwrap();
        book.set_active_dir(Stage::Build);
        book.write_log("building...").unwrap();

        fs::create_dir_all(book.root(Stage::Merge)).unwrap();
        fs::write(book.root(Stage::Merge).join("cover.jpg"), b"x").unwrap();

        let outcome = published(&mut book, &config, Duration::from_secs(3)).unwrap();
        assert_eq!(outcome, Outcome::Published);

        let converted = book.root(Stage::Converted).to_path_buf();
        assert!(converted.join("Some Book.m4b").exists());
        assert!(converted.join("cover.jpg").exists());
        assert!(converted.join("Some Book [44kHz].txt").exists());
        assert!(converted.join(format!("m4b-tool.{}.log", book.key)).is_file());
        assert!(!converted.join("description.txt").exists());
    }

    #[tokio::test]
    async fn empty_inbox_dir_is_skipped() {
        let config = Config::default();
        let mut config = config;
        let inbox = tempdir().unwrap();
        config.directories.inbox_dir = inbox.path().to_path_buf();
        let mut book = Audiobook::new(&inbox.path().join("Nothing Here"), &config);
        std::fs::create_dir_all(book.root(Stage::Inbox)).unwrap();

        let outcome = run(&mut book, &config).await;
        assert_eq!(outcome, Outcome::Skipped);
    }
}
