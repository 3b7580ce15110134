//! Converter Driver — builds the external merge tool's argument vector and
//! runs it against a staged book.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::audio::error_interpreter::{interpret, ConverterOutcome};
use crate::models::{Audiobook, Config, OrigFileType};

/// Build the merge tool's argument vector for `book`, per the logical
/// switch table: passthrough (copy) for already-AAC sources, transcode
/// otherwise; cover art, chapters file, and ID3 seed tags appended when
/// present.
pub fn build_args(book: &Audiobook, config: &Config) -> Vec<String> {
    let mut args = vec!["merge".to_string(), book.root(crate::models::Stage::Merge).display().to_string(), "-n".to_string()];

    if config.diagnostics.debug {
        args.push("--debug".to_string());
    } else {
        args.push("-q".to_string());
    }

    let should_copy = matches!(book.orig_file_type, Some(OrigFileType::M4a) | Some(OrigFileType::M4b));
    if should_copy {
        args.push("--audio-codec".to_string());
        args.push("copy".to_string());
    } else {
        args.push("--audio-codec".to_string());
        args.push("libfdk_aac".to_string());
        args.push("--audio-bitrate".to_string());
        args.push(format!("{}k", book.bitrate_target.unwrap_or(64)));
        args.push("--audio-samplerate".to_string());
        args.push(book.samplerate.unwrap_or(44100).to_string());
    }

    args.push("--jobs".to_string());
    args.push(config.runtime.cpu_cores.to_string());

    args.push("--output-file".to_string());
    args.push(book.build_file().display().to_string());

    args.push("--logfile".to_string());
    args.push(book.log_path().display().to_string());

    args.push("--no-chapter-reindexing".to_string());

    if config.converter.skip_covers {
        args.push("--no-cover-image".to_string());
    } else if !book.id3.has_embedded_cover {
        if let Some(cover) = &book.cover_art {
            args.push("--cover".to_string());
            args.push(cover.display().to_string());
        }
    }

    if config.converter.use_filenames_as_chapters {
        args.push("--use-filenames-as-chapters".to_string());
    }

    if let Some(chapters_file) = find_chapters_file(book) {
        args.push(format!("--chapters-file={}", chapters_file.display()));
    }

    args.extend(build_id3_tag_args(book));

    args
}

fn find_chapters_file(book: &Audiobook) -> Option<std::path::PathBuf> {
    let merge_dir = book.root(crate::models::Stage::Merge);
    std::fs::read_dir(merge_dir).ok()?.filter_map(|e| e.ok()).map(|e| e.path()).find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with("chapters.txt"))
            .unwrap_or(false)
    })
}

fn build_id3_tag_args(book: &Audiobook) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(title) = &book.id3.title {
        args.push("--name".to_string());
        args.push(title.clone());
    }
    if let Some(author) = &book.id3.author {
        args.push("--artist".to_string());
        args.push(author.clone());
    }
    if let Some(year) = book.id3.year {
        args.push("--year".to_string());
        args.push(year.to_string());
    }
    if let Some(comment) = &book.id3.comment {
        args.push("--comment".to_string());
        args.push(comment.clone());
    }
    args
}

/// Run the configured merge tool against a staged book and interpret its
/// output into a disposition.
pub async fn run(book: &Audiobook, config: &Config) -> Result<ConverterOutcome> {
    let args = build_args(book, config);
    let output = Command::new(&config.advanced.merge_tool_path)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to execute {}", config.advanced.merge_tool_path))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let build_file_exists = book.build_file().is_file();

    Ok(interpret(&stdout, &stderr, build_file_exists))
}
