//! Metadata extraction from audio file tags
//!
//! Uses lofty to read ID3v2 (MP3), Vorbis comments (FLAC), and AIFF tags.
//! Only the fields the mix uses are kept: title and artist for the cue
//! sheet, genre for the tolerance and duration tables.

use crate::types::TrackMetadata;
use lofty::{Accessor, Probe, TaggedFileExt};
use std::path::Path;
use tracing::{debug, warn};

/// Extract metadata from an audio file's tags
///
/// On error (corrupt tags, missing file), returns default empty metadata.
pub fn extract_metadata(path: &Path) -> TrackMetadata {
    match read_tags(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Failed to read metadata from {}: {}", path.display(), e);
            TrackMetadata::default()
        }
    }
}

fn read_tags(path: &Path) -> Result<TrackMetadata, lofty::error::LoftyError> {
    let tagged_file = Probe::open(path)?.read()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let metadata = match tag {
        Some(tag) => TrackMetadata {
            title: non_empty(tag.title().as_deref()),
            artist: non_empty(tag.artist().as_deref()),
            genre: non_empty(tag.genre().as_deref()),
        },
        None => {
            debug!("No tags found in {}", path.display());
            TrackMetadata::default()
        }
    };

    Ok(metadata)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
