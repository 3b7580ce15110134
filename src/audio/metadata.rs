//! Metadata Extractor — tag read/write, narrator heuristic, and the
//! bitrate/samplerate probe used to seed conversion targets.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::Result;
use id3::TagLike;
use regex::Regex;

use crate::audio::probe::{probe_file, quantize_bitrate, RateMode};
use crate::models::{Audiobook, Id3Info, OrchestratorError, OrigFileType};

/// Result of probing a source file for conversion sizing, per the
/// standard/actual bitrate distinction used to pick a target encode rate.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub standard_bitrate_kbps: u32,
    pub actual_bitrate_kbps: u32,
    pub samplerate_hz: u32,
    pub is_vbr: bool,
}

/// Probe a file's bitrate/samplerate/VBR-ness. Never panics on a corrupt
/// file — returns `BadFile` instead.
pub async fn probe(ffprobe_path: &str, file: &Path) -> Result<ProbeResult, OrchestratorError> {
    let probed = probe_file(ffprobe_path, file).await.map_err(|e| OrchestratorError::BadFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(ProbeResult {
        standard_bitrate_kbps: quantize_bitrate(probed.bitrate_kbps),
        actual_bitrate_kbps: probed.bitrate_kbps,
        samplerate_hz: probed.sample_rate_hz,
        is_vbr: probed.rate_mode == RateMode::Vbr,
    })
}

/// One ID3/MP4 tag value, keyed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Year,
    Comment,
    Composer,
    HasCover,
}

#[derive(Debug, Clone)]
pub enum TagValue {
    Text(String),
    Year(i32),
    Bool(bool),
}

/// Read a single tag key from an audio file, auto-dispatching on extension.
/// Returns `Ok(None)` if the file is decodable but the tag is absent.
pub fn read_tag(file: &Path, key: TagKey) -> Result<Option<TagValue>, OrchestratorError> {
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
    match OrigFileType::from_extension(ext) {
        Some(OrigFileType::Mp3) => read_tag_mp3(file, key),
        Some(OrigFileType::M4a) | Some(OrigFileType::M4b) => read_tag_m4a(file, key),
        _ => Err(OrchestratorError::BadFile {
            path: file.to_path_buf(),
            reason: "not a decodable audio file".to_string(),
        }),
    }
}

fn read_tag_mp3(file: &Path, key: TagKey) -> Result<Option<TagValue>, OrchestratorError> {
    let tag = id3::Tag::read_from_path(file).map_err(|e| OrchestratorError::BadFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(match key {
        TagKey::Title => tag.title().map(|s| TagValue::Text(s.to_string())),
        TagKey::Artist => tag.artist().map(|s| TagValue::Text(s.to_string())),
        TagKey::Album => tag.album().map(|s| TagValue::Text(s.to_string())),
        TagKey::AlbumArtist => tag.album_artist().map(|s| TagValue::Text(s.to_string())),
        TagKey::Year => tag.year().map(TagValue::Year),
        TagKey::Comment => tag.comments().next().map(|c| TagValue::Text(c.text.clone())),
        TagKey::Composer => tag
            .get("TCOM")
            .and_then(|f| f.content().text())
            .map(|s| TagValue::Text(s.to_string())),
        TagKey::HasCover => Some(TagValue::Bool(tag.pictures().next().is_some())),
    })
}

fn read_tag_m4a(file: &Path, key: TagKey) -> Result<Option<TagValue>, OrchestratorError> {
    let tag = mp4ameta::Tag::read_from_path(file).map_err(|e| OrchestratorError::BadFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(match key {
        TagKey::Title => tag.title().map(|s| TagValue::Text(s.to_string())),
        TagKey::Artist => tag.artist().map(|s| TagValue::Text(s.to_string())),
        TagKey::Album => tag.album().map(|s| TagValue::Text(s.to_string())),
        TagKey::AlbumArtist => tag.album_artist().map(|s| TagValue::Text(s.to_string())),
        TagKey::Year => tag.year().and_then(|s| s.parse::<i32>().ok()).map(TagValue::Year),
        TagKey::Comment => tag.comment().map(|s| TagValue::Text(s.to_string())),
        TagKey::Composer => tag.composer().map(|s| TagValue::Text(s.to_string())),
        TagKey::HasCover => Some(TagValue::Bool(tag.artwork().is_some())),
    })
}

/// Write the given tag values to `file` atomically (all-or-nothing). Fails
/// with `BadFile` if the file is not a decodable audio file.
pub fn write_tags(file: &Path, values: &[(TagKey, TagValue)]) -> Result<(), OrchestratorError> {
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
    match OrigFileType::from_extension(ext) {
        Some(OrigFileType::Mp3) => write_tags_mp3(file, values),
        Some(OrigFileType::M4a) | Some(OrigFileType::M4b) => write_tags_m4a(file, values),
        _ => Err(OrchestratorError::BadFile {
            path: file.to_path_buf(),
            reason: "not a decodable audio file".to_string(),
        }),
    }
}

fn write_tags_mp3(file: &Path, values: &[(TagKey, TagValue)]) -> Result<(), OrchestratorError> {
    let mut tag = id3::Tag::read_from_path(file).unwrap_or_default();
    for (key, value) in values {
        match (key, value) {
            (TagKey::Title, TagValue::Text(v)) => tag.set_title(v.clone()),
            (TagKey::Artist, TagValue::Text(v)) => tag.set_artist(v.clone()),
            (TagKey::Album, TagValue::Text(v)) => tag.set_album(v.clone()),
            (TagKey::AlbumArtist, TagValue::Text(v)) => tag.set_album_artist(v.clone()),
            (TagKey::Year, TagValue::Year(v)) => tag.set_year(*v),
            (TagKey::Comment, TagValue::Text(v)) => {
                tag.add_frame(id3::frame::Comment {
                    lang: "eng".to_string(),
                    description: String::new(),
                    text: v.clone(),
                });
            }
            _ => continue,
        };
    }
    tag.write_to_path(file, id3::Version::Id3v24).map_err(|e| OrchestratorError::BadFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_tags_m4a(file: &Path, values: &[(TagKey, TagValue)]) -> Result<(), OrchestratorError> {
    let mut tag = mp4ameta::Tag::read_from_path(file).unwrap_or_default();
    for (key, value) in values {
        match (key, value) {
            (TagKey::Title, TagValue::Text(v)) => tag.set_title(v.clone()),
            (TagKey::Artist, TagValue::Text(v)) => tag.set_artist(v.clone()),
            (TagKey::Album, TagValue::Text(v)) => tag.set_album(v.clone()),
            (TagKey::AlbumArtist, TagValue::Text(v)) => tag.set_album_artist(v.clone()),
            (TagKey::Year, TagValue::Year(v)) => tag.set_year(v.to_string()),
            (TagKey::Comment, TagValue::Text(v)) => tag.set_comment(v.clone()),
            (TagKey::Composer, TagValue::Text(v)) => tag.set_composer(v.clone()),
            _ => continue,
        };
    }
    tag.write_to_path(file).map_err(|e| OrchestratorError::BadFile {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })
}

fn narrator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)read by\s+(.+?)(?:[.,;]|$)").expect("static regex"))
}

/// Pull a narrator name out of a comment like "Read by John Doe." or
/// "Narrated by Jane Roe".
pub fn extract_narrator(comment: &str) -> Option<String> {
    narrator_regex()
        .captures(comment)
        .or_else(|| {
            static RE2: OnceLock<Regex> = OnceLock::new();
            RE2.get_or_init(|| Regex::new(r"(?i)narrated by\s+(.+?)(?:[.,;]|$)").expect("static regex"))
                .captures(comment)
        })
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Populate `book.id3`, `book.bitrate_target`, and `book.samplerate` by
/// combining tags from the first audio file under the active stage with
/// heuristic parsing of the comment field and an `ffprobe` pass used to
/// seed the conversion target rate.
pub async fn derive(book: &mut Audiobook, ffprobe_path: &str) -> Result<(), OrchestratorError> {
    let first = book.audio_files.first().cloned().ok_or_else(|| OrchestratorError::BadFile {
        path: book.active_root().to_path_buf(),
        reason: "no audio files to derive metadata from".to_string(),
    })?;

    let title = read_tag(&first, TagKey::Title)?;
    let artist = read_tag(&first, TagKey::Artist)?;
    let year = read_tag(&first, TagKey::Year)?;
    let comment = read_tag(&first, TagKey::Comment)?;
    let has_cover = read_tag(&first, TagKey::HasCover)?;
    let probed = probe(ffprobe_path, &first).await?;

    let comment_text = match &comment {
        Some(TagValue::Text(s)) => Some(s.clone()),
        _ => None,
    };

    book.id3 = Id3Info {
        title: match title {
            Some(TagValue::Text(s)) => Some(s),
            _ => None,
        },
        author: match artist {
            Some(TagValue::Text(s)) => Some(s),
            _ => None,
        },
        year: match year {
            Some(TagValue::Year(y)) => Some(y),
            _ => None,
        },
        narrator: comment_text.as_deref().and_then(extract_narrator),
        comment: comment_text,
        has_embedded_cover: matches!(has_cover, Some(TagValue::Bool(true))),
    };

    book.bitrate_target = Some(probed.standard_bitrate_kbps);
    book.samplerate = Some(probed.samplerate_hz);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_narrator_from_read_by_comment() {
        assert_eq!(extract_narrator("Read by John Doe."), Some("John Doe".to_string()));
        assert_eq!(
            extract_narrator("Unabridged. Read by Jane Roe; bonus content included"),
            Some("Jane Roe".to_string())
        );
    }

    #[test]
    fn extracts_narrator_from_narrated_by_comment() {
        assert_eq!(extract_narrator("Narrated by Sam Lee"), Some("Sam Lee".to_string()));
    }

    #[test]
    fn no_narrator_marker_returns_none() {
        assert_eq!(extract_narrator("A thrilling tale of adventure."), None);
    }

    #[tokio::test]
    async fn derive_propagates_error_on_unreadable_audio_file() {
        let config = crate::models::Config::default();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("01.mp3");
        std::fs::write(&file, b"not real audio").unwrap();

        let mut book = Audiobook::new(dir.path(), &config);
        book.audio_files = vec![file];

        let result = derive(&mut book, "/definitely/does/not/exist/ffprobe").await;
        assert!(result.is_err());
    }
}
