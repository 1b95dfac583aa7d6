//! Builds [`Track`] entries from audio files on disk, backed by `lofty`.
//!
//! Missing tags degrade gracefully: the title falls back to a cleaned-up
//! file name, artist and album to fixed placeholders, and a missing duration
//! to 0 (displayed as unknown). Unreadable files are skipped with a warning
//! instead of failing the whole load.

use std::path::Path;

use log::{debug, warn};
use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::TaggedFileExt;
use lofty::prelude::{Accessor, AudioFile};
use lofty::probe::Probe;
use lofty::tag::Tag;
use uuid::Uuid;

use crate::protocol::Track;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Reads every given path, in order, keeping the readable ones.
pub fn load_tracks<P: AsRef<Path>>(paths: &[P]) -> Vec<Track> {
    let mut tracks = Vec::with_capacity(paths.len());
    for path in paths {
        match load_track(path.as_ref()) {
            Some(track) => tracks.push(track),
            None => warn!("Skipping unreadable file {}", path.as_ref().display()),
        }
    }
    debug!("Loaded {} of {} files", tracks.len(), paths.len());
    tracks
}

fn load_track(path: &Path) -> Option<Track> {
    let options = ParseOptions::new()
        .read_properties(true)
        .read_cover_art(true)
        .parsing_mode(ParsingMode::BestAttempt);
    let tagged_file = match Probe::open(path) {
        Ok(probe) => match probe.options(options).read() {
            Ok(tagged_file) => tagged_file,
            Err(e) => {
                debug!("Tag read failed for {}: {}", path.display(), e);
                return None;
            }
        },
        Err(e) => {
            debug!("Could not open {}: {}", path.display(), e);
            return None;
        }
    };

    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let title = first_non_empty_value(primary_tag, tags, |tag| {
        tag.title().map(|value| value.into_owned())
    })
    .unwrap_or_else(|| fallback_title(path));
    let artist = first_non_empty_value(primary_tag, tags, |tag| {
        tag.artist().map(|value| value.into_owned())
    })
    .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let album = first_non_empty_value(primary_tag, tags, |tag| {
        tag.album().map(|value| value.into_owned())
    })
    .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    // Milliseconds; 0 means the container did not report a duration.
    let duration_ms = tagged_file.properties().duration().as_millis() as u64;

    let artwork_ref = primary_tag
        .iter()
        .copied()
        .chain(tags.iter())
        .find_map(|tag| {
            tag.pictures()
                .first()
                .map(|picture| picture.mime_type().map(|mime| mime.as_str().to_string()))
        })
        .flatten();

    Some(Track {
        id: Uuid::new_v4().to_string(),
        title,
        artist,
        album,
        duration_ms,
        artwork_ref,
        source: path.to_path_buf(),
    })
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> Option<String>
where
    F: FnMut(&Tag) -> Option<String>,
{
    if let Some(tag) = primary_tag {
        if let Some(value) = extractor(tag) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    for tag in tags {
        if let Some(value) = extractor(tag) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Title fallback for untagged files: the file stem with separators turned
/// into spaces and each word capitalized.
fn fallback_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("");
    let cleaned = capitalize_words(&stem.replace(['-', '_'], " "));
    if cleaned.is_empty() {
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("Unknown Title")
            .to_string()
    } else {
        cleaned
    }
}

fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_fallback_title_capitalizes_stem_words() {
        assert_eq!(
            fallback_title(&PathBuf::from("/music/summer-nights_live.flac")),
            "Summer Nights Live"
        );
    }

    #[test]
    fn test_fallback_title_uses_file_name_when_stem_is_blank() {
        assert_eq!(fallback_title(&PathBuf::from("/music/---.mp3")), "---.mp3");
    }

    #[test]
    fn test_capitalize_words_handles_mixed_spacing() {
        assert_eq!(capitalize_words("  one   two three "), "One Two Three");
        assert_eq!(capitalize_words(""), "");
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let tracks = load_tracks(&[PathBuf::from("/nonexistent/missing.flac")]);
        assert!(tracks.is_empty());
    }
}
