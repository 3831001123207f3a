//! Core data types for djmix
//!
//! These types represent the domain model and flow through the pipeline:
//! track inputs are analyzed into immutable [`TrackProfile`]s, which the
//! orderer, planner and renderer consume.

use crate::analysis::key::camelot::CamelotKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// Convert from numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn from_index(index: u8) -> Option<Self> {
        match index % 12 {
            0 => Some(PitchClass::C),
            1 => Some(PitchClass::Cs),
            2 => Some(PitchClass::D),
            3 => Some(PitchClass::Ds),
            4 => Some(PitchClass::E),
            5 => Some(PitchClass::F),
            6 => Some(PitchClass::Fs),
            7 => Some(PitchClass::G),
            8 => Some(PitchClass::Gs),
            9 => Some(PitchClass::A),
            10 => Some(PitchClass::As),
            11 => Some(PitchClass::B),
            _ => None,
        }
    }
}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

/// How much the analyzer trusts a tempo value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoConfidence {
    High,
    Low,
}

/// Tempo of a track in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
    pub confidence: TempoConfidence,
}

impl Tempo {
    pub fn confident(bpm: f64) -> Self {
        Self {
            bpm,
            confidence: TempoConfidence::High,
        }
    }

    pub fn uncertain(bpm: f64) -> Self {
        Self {
            bpm,
            confidence: TempoConfidence::Low,
        }
    }

    pub fn is_confident(&self) -> bool {
        self.confidence == TempoConfidence::High
    }

    /// Seconds per 4/4 bar at this tempo
    pub fn bar_seconds(&self) -> f64 {
        if self.bpm > 0.0 {
            240.0 / self.bpm
        } else {
            0.0
        }
    }
}

// =============================================================================
// Structure
// =============================================================================

/// Structural role of a region of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Intro,
    Verse,
    Buildup,
    Drop,
    Breakdown,
    Outro,
    /// Structure could not be determined; always safe to cut
    Unknown,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Intro => "intro",
            SegmentKind::Verse => "verse",
            SegmentKind::Buildup => "buildup",
            SegmentKind::Drop => "drop",
            SegmentKind::Breakdown => "breakdown",
            SegmentKind::Outro => "outro",
            SegmentKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous structural region `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
    /// Mean normalized energy over the region (0.0 - 1.0)
    pub avg_energy: f64,
}

impl Segment {
    pub fn new(kind: SegmentKind, start: f64, end: f64, avg_energy: f64) -> Self {
        Self {
            kind,
            start,
            end,
            avg_energy,
        }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// Downbeat grid of a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Tempo the grid was laid out at
    pub tempo_bpm: f64,
    /// Ordered downbeat timestamps in seconds
    pub downbeats: Vec<f64>,
}

impl BeatGrid {
    /// Lay out a fixed-interval downbeat grid starting at `first_downbeat`
    pub fn regular(tempo_bpm: f64, first_downbeat: f64, duration: f64) -> Self {
        if tempo_bpm <= 0.0 || duration <= 0.0 {
            return Self::default();
        }
        let bar = 240.0 / tempo_bpm;
        let mut first = first_downbeat.max(0.0);
        // Keep the grid anchored near the start even for late phase estimates
        while first - bar >= 0.0 {
            first -= bar;
        }
        let count = ((duration - first) / bar).floor().max(0.0) as usize;
        let downbeats = (0..=count)
            .map(|i| first + i as f64 * bar)
            .filter(|&t| t <= duration)
            .collect();
        Self {
            tempo_bpm,
            downbeats,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.downbeats.is_empty()
    }

    /// Nearest downbeat to `target` within `[lo, hi]`, if any
    pub fn nearest_within(&self, target: f64, lo: f64, hi: f64) -> Option<f64> {
        self.downbeats
            .iter()
            .copied()
            .filter(|&t| t >= lo && t <= hi)
            .min_by(|a, b| {
                (a - target)
                    .abs()
                    .partial_cmp(&(b - target).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Per-window normalized RMS energy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyEnvelope {
    pub window_seconds: f64,
    pub values: Vec<f32>,
}

// =============================================================================
// Track representation
// =============================================================================

/// Metadata extracted from audio file tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
}

/// Immutable analysis result for a single source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackProfile {
    /// Deterministic ID derived from file identity
    pub track_id: i32,
    /// Original file path
    pub source: PathBuf,
    /// File metadata from tags
    pub metadata: TrackMetadata,
    /// Duration in seconds
    pub duration: f64,
    pub tempo: Tempo,
    /// Camelot key, `None` when undetectable
    pub key: Option<CamelotKey>,
    /// Overall energy (0.0 - 1.0)
    pub energy: f64,
    /// Genre tag used for tolerance and duration tables
    pub genre: Option<String>,
    pub beat_grid: BeatGrid,
    /// Contiguous segments covering `[0, duration)`
    pub segments: Vec<Segment>,
    pub energy_envelope: EnergyEnvelope,
}

impl TrackProfile {
    /// Build a profile from already-known attributes with a regular grid at
    /// the given tempo. Used for precomputed inputs and in tests.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        source: impl Into<PathBuf>,
        duration: f64,
        tempo: Tempo,
        key: Option<CamelotKey>,
        energy: f64,
        genre: Option<&str>,
        segments: Vec<Segment>,
    ) -> Self {
        let source = source.into();
        let beat_grid = if tempo.is_confident() {
            BeatGrid::regular(tempo.bpm, 0.0, duration)
        } else {
            BeatGrid::default()
        };
        let segments = if segments.is_empty() {
            vec![Segment::new(SegmentKind::Unknown, 0.0, duration, energy)]
        } else {
            segments
        };
        Self {
            track_id: crate::discovery::generate_track_id(&source),
            source,
            metadata: TrackMetadata::default(),
            duration,
            tempo,
            key,
            energy: energy.clamp(0.0, 1.0),
            genre: genre.map(|g| g.to_string()),
            beat_grid,
            segments,
            energy_envelope: EnergyEnvelope::default(),
        }
    }

    pub fn first_segment(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// True when the analyzer could not find any structure
    pub fn is_unstructured(&self) -> bool {
        self.segments.iter().all(|s| s.kind == SegmentKind::Unknown)
    }

    /// Display name for reports: tag title, else file stem
    pub fn display_name(&self) -> String {
        self.metadata
            .title
            .clone()
            .or_else(|| {
                self.source
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| format!("track-{}", self.track_id))
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One entry of a mix request, as delivered by the track-selection layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInput {
    /// Location of the source audio file
    pub source: PathBuf,
    #[serde(default)]
    pub tempo_bpm: Option<f64>,
    /// Camelot notation ("1A" - "12B")
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Precomputed structure; analyzed on demand when absent
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
    #[serde(default)]
    pub beat_grid: Option<Vec<f64>>,
}

impl TrackInput {
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            tempo_bpm: None,
            key: None,
            energy: None,
            genre: None,
            segments: None,
            beat_grid: None,
        }
    }
}

/// A full mix request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixRequest {
    pub tracks: Vec<TrackInput>,
    /// Let the harmonic orderer choose the sequence
    #[serde(default)]
    pub order: bool,
    /// Target energy-curve shape for ordering
    #[serde(default)]
    pub energy_curve: Option<crate::ordering::EnergyCurve>,
    /// Explicit seed for tie-breaking variety
    #[serde(default)]
    pub seed: Option<u64>,
    /// Drop tracks that fail to decode instead of failing the request
    #[serde(default)]
    pub skip_unreadable: bool,
}

impl MixRequest {
    pub fn new(tracks: Vec<TrackInput>) -> Self {
        Self {
            tracks,
            order: false,
            energy_curve: None,
            seed: None,
            skip_unreadable: false,
        }
    }
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Decoded audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio formats accepted as mix sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aiff,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Wav => "WAV",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Aiff => "AIFF",
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}
