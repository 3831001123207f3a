//! Camelot Wheel notation and harmonic relationships
//!
//! The Camelot Wheel is a visual representation of musical keys that
//! makes harmonic mixing intuitive for DJs.
//!
//! - Numbers 1-12 represent positions on the wheel
//! - 'A' suffix = minor key, 'B' suffix = major key
//! - Adjacent numbers are harmonically compatible (perfect fifth)
//! - Same number, different letter = relative major/minor
//! - +7 positions = one semitone up, the classic "energy boost" modulation

use crate::types::{Mode, PitchClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position on the Camelot wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CamelotKey {
    /// Wheel position, 1-12
    pub number: u8,
    /// Minor ('A') or major ('B')
    pub mode: Mode,
}

impl CamelotKey {
    pub fn new(number: u8, mode: Mode) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, mode })
    }

    /// Parse Camelot notation such as "8A" or "12b"
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        let letter = code.chars().last()?;
        let mode = match letter.to_ascii_uppercase() {
            'A' => Mode::Minor,
            'B' => Mode::Major,
            _ => return None,
        };
        let num_str = &code[..code.len() - letter.len_utf8()];
        let number: u8 = num_str.parse().ok()?;
        Self::new(number, mode)
    }

    pub fn letter(&self) -> char {
        match self.mode {
            Mode::Minor => 'A',
            Mode::Major => 'B',
        }
    }

    /// Clockwise steps from `self` to `other` (0-11), ignoring the letter
    fn clockwise_to(&self, other: &CamelotKey) -> u8 {
        ((other.number as i16 - self.number as i16).rem_euclid(12)) as u8
    }

    /// Harmonic distance: shortest wheel distance plus one for a letter change
    pub fn distance(&self, other: &CamelotKey) -> u8 {
        let cw = self.clockwise_to(other);
        let wheel = cw.min(12 - cw);
        wheel + u8::from(self.mode != other.mode)
    }

    /// Classify the harmonic relationship when mixing from `self` into `other`
    pub fn relation_to(&self, other: &CamelotKey) -> HarmonicRelation {
        let cw = self.clockwise_to(other);
        let same_letter = self.mode == other.mode;
        match (cw, same_letter) {
            (0, true) => HarmonicRelation::Same,
            (0, false) => HarmonicRelation::Relative,
            (1, true) | (11, true) => HarmonicRelation::Adjacent,
            (7, true) => HarmonicRelation::EnergyBoost,
            _ => HarmonicRelation::Clash {
                distance: self.distance(other),
            },
        }
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter())
    }
}

impl TryFrom<String> for CamelotKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CamelotKey::parse(&value).ok_or_else(|| format!("invalid Camelot key '{}'", value))
    }
}

impl From<CamelotKey> for String {
    fn from(key: CamelotKey) -> Self {
        key.to_string()
    }
}

/// Relationship between two keys on the wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum HarmonicRelation {
    Same,
    Relative,
    Adjacent,
    EnergyBoost,
    Clash { distance: u8 },
    /// At least one key could not be detected
    Unknown,
}

impl HarmonicRelation {
    /// Relation between two optional keys
    pub fn between(from: Option<CamelotKey>, to: Option<CamelotKey>) -> Self {
        match (from, to) {
            (Some(a), Some(b)) => a.relation_to(&b),
            _ => HarmonicRelation::Unknown,
        }
    }

    /// Compatibility score (0-100). `unknown_score` is the low-certainty
    /// floor used when a key is missing.
    pub fn score(&self, unknown_score: f64) -> f64 {
        match self {
            HarmonicRelation::Same => 100.0,
            HarmonicRelation::Relative => 90.0,
            HarmonicRelation::Adjacent => 80.0,
            HarmonicRelation::EnergyBoost => 70.0,
            HarmonicRelation::Clash { distance } => (60.0 - 10.0 * *distance as f64).max(0.0),
            HarmonicRelation::Unknown => unknown_score,
        }
    }

    /// Same key or relative major/minor
    pub fn is_tonal_match(&self) -> bool {
        matches!(self, HarmonicRelation::Same | HarmonicRelation::Relative)
    }

    pub fn is_clash(&self) -> bool {
        matches!(self, HarmonicRelation::Clash { .. })
    }

    pub fn label(&self) -> String {
        match self {
            HarmonicRelation::Same => "same key".to_string(),
            HarmonicRelation::Relative => "relative major/minor".to_string(),
            HarmonicRelation::Adjacent => "adjacent (+/-1)".to_string(),
            HarmonicRelation::EnergyBoost => "energy boost (+7)".to_string(),
            HarmonicRelation::Clash { distance } => format!("clash (distance {})", distance),
            HarmonicRelation::Unknown => "unknown key".to_string(),
        }
    }
}

/// Mapping from (PitchClass, Mode) to Camelot notation
///
/// Layout:
/// ```text
///      5A      5B
///    /    \  /    \
///  4A      4B      6B
///  |       |       |
///  3A      3B      7B
///    \    /  \    /
///      2A      8B
///       ...
/// ```
pub fn to_camelot(pitch: PitchClass, mode: Mode) -> CamelotKey {
    let number = match (pitch, mode) {
        // Minor keys (A)
        (PitchClass::A, Mode::Minor) => 8,   // Am
        (PitchClass::As, Mode::Minor) => 3,  // A#m / Bbm
        (PitchClass::B, Mode::Minor) => 10,  // Bm
        (PitchClass::C, Mode::Minor) => 5,   // Cm
        (PitchClass::Cs, Mode::Minor) => 12, // C#m / Dbm
        (PitchClass::D, Mode::Minor) => 7,   // Dm
        (PitchClass::Ds, Mode::Minor) => 2,  // D#m / Ebm
        (PitchClass::E, Mode::Minor) => 9,   // Em
        (PitchClass::F, Mode::Minor) => 4,   // Fm
        (PitchClass::Fs, Mode::Minor) => 11, // F#m / Gbm
        (PitchClass::G, Mode::Minor) => 6,   // Gm
        (PitchClass::Gs, Mode::Minor) => 1,  // G#m / Abm

        // Major keys (B)
        (PitchClass::A, Mode::Major) => 11,  // A
        (PitchClass::As, Mode::Major) => 6,  // A# / Bb
        (PitchClass::B, Mode::Major) => 1,   // B
        (PitchClass::C, Mode::Major) => 8,   // C
        (PitchClass::Cs, Mode::Major) => 3,  // C# / Db
        (PitchClass::D, Mode::Major) => 10,  // D
        (PitchClass::Ds, Mode::Major) => 5,  // D# / Eb
        (PitchClass::E, Mode::Major) => 12,  // E
        (PitchClass::F, Mode::Major) => 7,   // F
        (PitchClass::Fs, Mode::Major) => 2,  // F# / Gb
        (PitchClass::G, Mode::Major) => 9,   // G
        (PitchClass::Gs, Mode::Major) => 4,  // G# / Ab
    };
    CamelotKey { number, mode }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: &str) -> CamelotKey {
        CamelotKey::parse(code).unwrap()
    }

    #[test]
    fn test_camelot_mapping_covers_all_keys() {
        // Ensure all 24 key combinations map to unique Camelot codes
        let mut codes = std::collections::HashSet::new();

        for pitch_idx in 0..12 {
            let pitch = PitchClass::from_index(pitch_idx).unwrap();
            for mode in [Mode::Major, Mode::Minor] {
                let code = to_camelot(pitch, mode);
                assert!(codes.insert(code), "Duplicate code: {}", code);
            }
        }

        assert_eq!(codes.len(), 24);
    }

    #[test]
    fn test_camelot_examples() {
        // Common DJ reference points
        assert_eq!(to_camelot(PitchClass::A, Mode::Minor).to_string(), "8A");
        assert_eq!(to_camelot(PitchClass::C, Mode::Major).to_string(), "8B");
        assert_eq!(to_camelot(PitchClass::G, Mode::Minor).to_string(), "6A");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CamelotKey::parse("13A").is_none());
        assert!(CamelotKey::parse("0B").is_none());
        assert!(CamelotKey::parse("8C").is_none());
        assert!(CamelotKey::parse("").is_none());
        assert_eq!(key("12b").to_string(), "12B");
    }

    #[test]
    fn test_relations() {
        assert_eq!(key("8A").relation_to(&key("8A")), HarmonicRelation::Same);
        assert_eq!(key("8A").relation_to(&key("8B")), HarmonicRelation::Relative);
        assert_eq!(key("8A").relation_to(&key("9A")), HarmonicRelation::Adjacent);
        assert_eq!(key("8A").relation_to(&key("7A")), HarmonicRelation::Adjacent);
        assert_eq!(key("8A").relation_to(&key("3A")), HarmonicRelation::EnergyBoost);
        assert_eq!(
            key("8A").relation_to(&key("2B")),
            HarmonicRelation::Clash { distance: 7 }
        );
    }

    #[test]
    fn test_adjacent_wraps() {
        assert_eq!(key("12A").relation_to(&key("1A")), HarmonicRelation::Adjacent);
        assert_eq!(key("1B").relation_to(&key("12B")), HarmonicRelation::Adjacent);
    }

    #[test]
    fn test_scores_follow_wheel() {
        assert_eq!(HarmonicRelation::Same.score(10.0), 100.0);
        assert_eq!(HarmonicRelation::Relative.score(10.0), 90.0);
        assert_eq!(HarmonicRelation::Adjacent.score(10.0), 80.0);
        assert_eq!(HarmonicRelation::EnergyBoost.score(10.0), 70.0);
        assert_eq!(HarmonicRelation::Clash { distance: 2 }.score(10.0), 40.0);
        assert_eq!(HarmonicRelation::Clash { distance: 7 }.score(10.0), 0.0);
        assert_eq!(HarmonicRelation::Unknown.score(10.0), 10.0);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&key("5A")).unwrap();
        assert_eq!(json, "\"5A\"");
        let back: CamelotKey = serde_json::from_str("\"11B\"").unwrap();
        assert_eq!(back, key("11B"));
    }
}
