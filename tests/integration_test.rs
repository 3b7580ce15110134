//! Integration tests for auto-m4b: classification, scanning, and the
//! pipeline's pre-conversion stages working together against a real
//! temp-directory inbox.

use std::fs;
use std::path::Path;

use auto_m4b::core::classifier::classify;
use auto_m4b::core::pipeline::{self, Outcome};
use auto_m4b::core::scanner;
use auto_m4b::models::{Audiobook, Config, StructuralKind};
use tempfile::TempDir;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"fake audio data").unwrap();
}

fn test_config(inbox: &Path) -> Config {
    let mut config = Config::default();
    config.directories.inbox_dir = inbox.to_path_buf();
    config.directories.backup_dir = inbox.join(".backup");
    config.directories.merge_dir = inbox.join(".merge");
    config.directories.build_dir = inbox.join(".build");
    config.directories.converted_dir = inbox.join(".converted");
    config.directories.archive_dir = inbox.join(".archive");
    config.directories.fix_dir = inbox.join(".fix");
    config
}

/// Build the same shape of inbox used throughout these tests: one flat
/// multi-file book, one standalone single-file book, one already-converted
/// M4B, and one folder with no recognizable audio.
fn create_test_books(inbox: &Path) {
    let book1 = inbox.join("The_Hobbit");
    touch(&book1.join("01-Chapter1.mp3"));
    touch(&book1.join("02-Chapter2.mp3"));
    touch(&book1.join("03-Chapter3.mp3"));
    touch(&book1.join("cover.jpg"));

    let book2 = inbox.join("1984");
    touch(&book2.join("1984_Complete.mp3"));

    let book3 = inbox.join("Sapiens");
    touch(&book3.join("Sapiens.m4b"));

    let book4 = inbox.join("Random_Files");
    fs::create_dir_all(&book4).unwrap();
    fs::write(book4.join("notes.txt"), b"some notes").unwrap();
}

#[test]
fn scanner_finds_candidate_book_dirs_and_skips_junk() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    create_test_books(inbox);

    let candidates = scanner::candidate_book_dirs(inbox);
    let names: Vec<String> =
        candidates.iter().filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string())).collect();

    assert!(names.contains(&"The_Hobbit".to_string()));
    assert!(names.contains(&"1984".to_string()));
    assert!(names.contains(&"Sapiens".to_string()));
    assert!(!names.contains(&"Random_Files".to_string()));
}

#[test]
fn classify_distinguishes_flat_standalone_and_single_m4b() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    create_test_books(inbox);

    let (hobbit_kind, hobbit_files) = classify(&inbox.join("The_Hobbit")).unwrap();
    assert_eq!(hobbit_kind, StructuralKind::Flat);
    assert_eq!(hobbit_files.len(), 3);

    let (book_1984_kind, _) = classify(&inbox.join("1984")).unwrap();
    assert_eq!(book_1984_kind, StructuralKind::Standalone);

    let (sapiens_kind, sapiens_files) = classify(&inbox.join("Sapiens")).unwrap();
    assert_eq!(sapiens_kind, StructuralKind::Standalone);
    assert_eq!(sapiens_files.len(), 1);
}

#[test]
fn files_within_a_book_are_naturally_sorted() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();

    let book = inbox.join("Book");
    touch(&book.join("Chapter_10.mp3"));
    touch(&book.join("Chapter_2.mp3"));
    touch(&book.join("Chapter_1.mp3"));
    touch(&book.join("Chapter_20.mp3"));

    let (kind, files) = classify(&book).unwrap();
    assert_eq!(kind, StructuralKind::Flat);

    let names: Vec<String> =
        files.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
    assert_eq!(names, vec!["Chapter_1.mp3", "Chapter_2.mp3", "Chapter_10.mp3", "Chapter_20.mp3"]);
}

#[test]
fn m4a_files_are_treated_like_mp3() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();

    let book = inbox.join("Book");
    touch(&book.join("01.m4a"));
    touch(&book.join("02.m4a"));

    let (kind, files) = classify(&book).unwrap();
    assert_eq!(kind, StructuralKind::Flat);
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn mixed_layout_book_is_quarantined_to_fix_dir() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    let config = test_config(inbox);

    let book_dir = inbox.join("Weird Book");
    touch(&book_dir.join("00.mp3"));
    let nested = book_dir.join("extra");
    touch(&nested.join("01.mp3"));

    let mut book = Audiobook::new(&book_dir, &config);
    let outcome = pipeline::run(&mut book, &config).await;

    assert_eq!(outcome, Outcome::Quarantined);
    assert!(!book_dir.exists());
    assert!(config.directories.fix_dir.join("Weird Book").exists());
}

#[tokio::test]
async fn multi_book_layout_is_quarantined_not_converted() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    let config = test_config(inbox);

    let book_dir = inbox.join("Collection");
    touch(&book_dir.join("The Hobbit").join("01.mp3"));
    touch(&book_dir.join("The Hobbit").join("02.mp3"));
    touch(&book_dir.join("1984").join("01.mp3"));
    touch(&book_dir.join("1984").join("02.mp3"));

    let (kind, _) = classify(&book_dir).unwrap();
    assert_eq!(kind, StructuralKind::MultiBook);

    let mut book = Audiobook::new(&book_dir, &config);
    let outcome = pipeline::run(&mut book, &config).await;
    assert_eq!(outcome, Outcome::Quarantined);
}

#[tokio::test]
async fn roman_numeral_filenames_are_quarantined() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    let config = test_config(inbox);

    let book_dir = inbox.join("Roman Book");
    touch(&book_dir.join("Part I - Prologue.mp3"));
    touch(&book_dir.join("Part II - A Long-expected Party.mp3"));
    touch(&book_dir.join("Part III - Shadow of the Past.mp3"));
    touch(&book_dir.join("Part IV - Riddles in the Dark.mp3"));
    touch(&book_dir.join("Part V - The Army of Storms.mp3"));
    touch(&book_dir.join("Part VI - Epilogue.mp3"));

    let mut book = Audiobook::new(&book_dir, &config);
    let outcome = pipeline::run(&mut book, &config).await;
    assert_eq!(outcome, Outcome::Quarantined);
}

#[test]
fn promote_standalone_moves_lonely_file_into_its_own_folder() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    let mut config = Config::default();
    config.directories.inbox_dir = inbox.to_path_buf();

    let file = inbox.join("Lonely Book.mp3");
    touch(&file);

    pipeline::promote_standalone(&file, &config).unwrap();

    assert!(inbox.join("Lonely Book").join("Lonely Book.mp3").exists());
    assert!(!file.exists());
}

#[tokio::test]
async fn empty_candidate_dir_is_skipped_end_to_end() {
    let temp = TempDir::new().unwrap();
    let inbox = temp.path();
    let config = test_config(inbox);

    let book_dir = inbox.join("Nothing Here");
    fs::create_dir_all(&book_dir).unwrap();

    let mut book = Audiobook::new(&book_dir, &config);
    let outcome = pipeline::run(&mut book, &config).await;
    assert_eq!(outcome, Outcome::Skipped);
}
