//! File scanning, track IDs and cache identities

use crate::error::{MixError, Result};
use crate::types::AudioFormat;
use hash32::FnvHasher;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Discovered audio file with basic metadata
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

/// Scan a path (file or directory) for audio files
///
/// Results are sorted by path so directory mode builds the same request on
/// every run regardless of filesystem iteration order.
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(MixError::FileNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();

    if input.is_file() {
        if let Some(file) = try_discover_file(input) {
            files.push(file);
        } else {
            return Err(MixError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
    } else if input.is_dir() {
        let walker = if recursive {
            WalkDir::new(input)
        } else {
            WalkDir::new(input).max_depth(1)
        };

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                if let Some(file) = try_discover_file(path) {
                    debug!("Discovered: {}", file.path.display());
                    files.push(file);
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
    }

    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

/// Try to create a DiscoveredFile if the path is a supported audio format
fn try_discover_file(path: &Path) -> Option<DiscoveredFile> {
    let ext = path.extension()?.to_str()?;
    let format = AudioFormat::from_extension(ext)?;

    let metadata = std::fs::metadata(path).ok()?;

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        format,
        size_bytes: metadata.len(),
    })
}

/// Generate a deterministic track ID from a file path
///
/// FNV-1a over the normalized path, masked to the positive i32 range.
pub fn generate_track_id(path: &Path) -> i32 {
    use hash32::Hasher as Hash32Hasher;

    let normalized = normalize_path_for_hash(path);

    let mut hasher = FnvHasher::default();
    hasher.write(normalized.as_bytes());
    let hash = hasher.finish32();

    (hash & 0x7FFFFFFF) as i32
}

/// Cache identity of a file: path, size and modification time
///
/// A re-encoded or replaced file at the same path gets a new identity, so
/// stale analysis is never served from the profile cache.
pub fn file_identity(path: &Path) -> Result<u64> {
    use hash32::Hasher as Hash32Hasher;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MixError::FileNotFound(path.to_path_buf()),
        _ => MixError::Io(e),
    })?;
    let mtime_nanos = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let normalized = normalize_path_for_hash(path);

    let mut low = FnvHasher::default();
    low.write(normalized.as_bytes());
    low.write(&metadata.len().to_le_bytes());

    let mut high = FnvHasher::default();
    high.write(&mtime_nanos.to_le_bytes());
    high.write(normalized.as_bytes());

    Ok(((high.finish32() as u64) << 32) | low.finish32() as u64)
}

/// Normalize a path string for consistent hashing across platforms
fn normalize_path_for_hash(path: &Path) -> String {
    let path_str = path.to_string_lossy();

    // Convert backslashes to forward slashes
    let normalized = path_str.replace('\\', "/");

    // Lowercase for case-insensitive filesystems
    normalized.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_track_id_deterministic() {
        let path = Path::new("/Users/dj/music/track.mp3");
        assert_eq!(generate_track_id(path), generate_track_id(path));
    }

    #[test]
    fn test_track_id_positive() {
        let paths = [
            "/a.mp3",
            "/very/long/path/to/some/deeply/nested/file.flac",
            "C:\\Music\\Track.wav",
        ];

        for path_str in paths {
            let id = generate_track_id(Path::new(path_str));
            assert!(id >= 0, "Track ID should be non-negative: {}", id);
        }
    }

    #[test]
    fn test_path_normalization() {
        let win = normalize_path_for_hash(Path::new("C:\\Music\\Track.mp3"));
        let unix = normalize_path_for_hash(Path::new("c:/music/track.mp3"));
        assert_eq!(win, unix);
    }

    #[test]
    fn test_file_identity_changes_with_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        std::fs::write(&path, b"abc").unwrap();
        let before = file_identity(&path).unwrap();
        assert_eq!(before, file_identity(&path).unwrap());

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"defg").unwrap();
        drop(f);
        assert_ne!(before, file_identity(&path).unwrap());
    }

    #[test]
    fn test_file_identity_missing_file() {
        let err = file_identity(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, MixError::FileNotFound(_)));
    }

    #[test]
    fn test_scan_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = scan(dir.path(), false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp3", "b.wav"]);
    }
}
