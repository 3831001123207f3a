//! Tunable constants for analysis, ordering, planning and rendering
//!
//! Every threshold the engine uses lives here with a serde default, so a
//! TOML file only needs to name the values it overrides:
//!
//! ```toml
//! [planner]
//! fallback_mix_out_fraction = 0.95
//!
//! [planner.genre_durations.techno]
//! shortest = 16.0
//! longest = 40.0
//! ```

use crate::error::{MixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Root of the tunable configuration tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub analysis: AnalysisConfig,
    pub ordering: OrderingConfig,
    pub planner: PlannerConfig,
    pub render: RenderConfig,
    pub session: SessionConfig,
}

impl MixConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MixError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: MixConfig = toml::from_str(&text).map_err(|e| {
            MixError::ConfigError(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Platform config location (`~/.config/djmix/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "djmix")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from an explicit path, else the platform path if present, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject combinations that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.window_seconds <= 0.0 || a.window_seconds > 4.0 {
            return Err(MixError::ConfigError(format!(
                "analysis.window_seconds must be in (0, 4], got {}",
                a.window_seconds
            )));
        }
        if a.min_tempo_bpm <= 0.0 || a.min_tempo_bpm >= a.max_tempo_bpm {
            return Err(MixError::ConfigError(
                "analysis.min_tempo_bpm must be positive and below max_tempo_bpm".to_string(),
            ));
        }
        if a.cache_capacity == 0 {
            return Err(MixError::ConfigError(
                "analysis.cache_capacity must be positive".to_string(),
            ));
        }

        let o = &self.ordering;
        let weights = o.harmonic_weight + o.tempo_weight + o.energy_weight;
        if weights <= 0.0 || o.harmonic_weight < 0.0 || o.tempo_weight < 0.0 || o.energy_weight < 0.0 {
            return Err(MixError::ConfigError(
                "ordering weights must be non-negative and not all zero".to_string(),
            ));
        }

        let p = &self.planner;
        if p.min_bars < 4 || p.max_bars > 64 || p.min_bars > p.max_bars || p.min_bars % 4 != 0 || p.max_bars % 4 != 0 {
            return Err(MixError::ConfigError(
                "planner bars must be multiples of 4 within [4, 64]".to_string(),
            ));
        }
        if !(0.5..=1.0).contains(&p.fallback_mix_out_fraction) {
            return Err(MixError::ConfigError(format!(
                "planner.fallback_mix_out_fraction must be in [0.5, 1.0], got {}",
                p.fallback_mix_out_fraction
            )));
        }
        if p.quick_cut_seconds <= 0.0 || p.quick_cut_seconds > 2.0 {
            return Err(MixError::ConfigError(
                "planner.quick_cut_seconds must be in (0, 2]".to_string(),
            ));
        }
        if p.flat_energy_delta > p.low_energy_delta || p.low_energy_delta >= p.high_energy_delta {
            return Err(MixError::ConfigError(
                "planner energy deltas must satisfy flat <= low < high".to_string(),
            ));
        }
        if p.float_threshold_percent < 0.0 || p.float_threshold_percent > p.max_stretch_percent {
            return Err(MixError::ConfigError(
                "planner.float_threshold_percent must be within [0, max_stretch_percent]".to_string(),
            ));
        }
        for (genre, range) in p.genre_durations.iter() {
            if range.shortest <= 0.0 || range.shortest > range.longest {
                return Err(MixError::ConfigError(format!(
                    "planner.genre_durations.{}: shortest must be positive and <= longest",
                    genre
                )));
            }
        }

        if self.render.step_timeout_seconds == 0 {
            return Err(MixError::ConfigError(
                "render.step_timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Analysis
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Energy/onset analysis window. Windows above ~2s miss short buildups.
    pub window_seconds: f64,
    /// Tracks shorter than this are rejected
    pub min_duration_seconds: f64,
    /// Plausible tempo range; anything outside is treated as undetectable
    pub min_tempo_bpm: f64,
    pub max_tempo_bpm: f64,
    /// Ratio of on-grid onset strength to mean onset strength below which the
    /// grid is considered unreliable
    pub min_grid_confidence: f64,
    /// Minimum estimator confidence to trust an estimated tempo
    pub min_estimate_confidence: f64,
    /// Energy rise (normalized) that marks a drop
    pub drop_rise_threshold: f64,
    /// How far back the drop rise is measured from
    pub rise_lookback_seconds: f64,
    /// Beats a drop must hold its level for
    pub drop_sustain_beats: f64,
    /// Minimum normalized energy of a drop
    pub drop_min_level: f64,
    /// A breakdown sits below this fraction of the preceding drop's level
    pub breakdown_ratio: f64,
    /// Intro/outro windows sit below this normalized energy
    pub edge_level: f64,
    /// Intro or outro never exceeds this fraction of the track
    pub max_edge_fraction: f64,
    /// Profiles kept in the shared cache before the oldest are evicted
    pub cache_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_seconds: 1.0,
            min_duration_seconds: 3.0,
            min_tempo_bpm: 60.0,
            max_tempo_bpm: 200.0,
            min_grid_confidence: 1.1,
            min_estimate_confidence: 0.3,
            drop_rise_threshold: 0.25,
            rise_lookback_seconds: 8.0,
            drop_sustain_beats: 16.0,
            drop_min_level: 0.6,
            breakdown_ratio: 0.6,
            edge_level: 0.5,
            max_edge_fraction: 0.3,
            cache_capacity: crate::analysis::DEFAULT_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    pub harmonic_weight: f64,
    pub tempo_weight: f64,
    pub energy_weight: f64,
    /// Score assigned to a component that cannot be measured
    pub low_certainty_score: f64,
    /// Points lost per percent of tempo difference beyond the tolerance
    pub tempo_decay_per_percent: f64,
    /// Score for a half/double-time match within tolerance
    pub half_double_score: f64,
    /// Tolerance used for genres not in the table (percent)
    pub default_tempo_tolerance: f64,
    /// Genre -> tempo tolerance window (percent)
    pub genre_tempo_tolerance: BTreeMap<String, f64>,
    /// Upper bound on 2-opt improvement passes
    pub max_two_opt_passes: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        let genre_tempo_tolerance = [
            ("techno", 3.0),
            ("house", 3.0),
            ("techhouse", 3.0),
            ("trance", 3.0),
            ("progressive", 3.0),
            ("dnb", 4.0),
            ("dubstep", 5.0),
            ("hiphop", 8.0),
            ("pop", 8.0),
            ("rnb", 8.0),
            ("rock", 8.0),
        ]
        .into_iter()
        .map(|(g, t)| (g.to_string(), t))
        .collect();

        Self {
            harmonic_weight: 0.5,
            tempo_weight: 0.3,
            energy_weight: 0.2,
            low_certainty_score: 10.0,
            tempo_decay_per_percent: 10.0,
            half_double_score: 85.0,
            default_tempo_tolerance: 5.0,
            genre_tempo_tolerance,
            max_two_opt_passes: 50,
        }
    }
}

impl OrderingConfig {
    /// Tempo tolerance (percent) for a pair; the tighter genre wins
    pub fn pair_tempo_tolerance(&self, a: Option<&str>, b: Option<&str>) -> f64 {
        let lookup = |g: Option<&str>| {
            g.map(canonical_genre)
                .and_then(|g| self.genre_tempo_tolerance.get(&g).copied())
                .unwrap_or(self.default_tempo_tolerance)
        };
        lookup(a).min(lookup(b))
    }
}

// =============================================================================
// Planner
// =============================================================================

/// Base crossfade length bounds for a genre, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    pub shortest: f64,
    pub longest: f64,
}

impl DurationRange {
    pub const fn new(shortest: f64, longest: f64) -> Self {
        Self { shortest, longest }
    }

    pub fn midpoint(&self) -> f64 {
        (self.shortest + self.longest) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// |energy delta| below this counts as "low"
    pub low_energy_delta: f64,
    /// |energy delta| above this counts as "high"
    pub high_energy_delta: f64,
    /// |energy delta| below this counts as "near zero" and lengthens the blend
    pub flat_energy_delta: f64,
    /// Duration multiplier for high energy deltas
    pub high_delta_scale: f64,
    /// Duration multiplier for near-zero energy deltas
    pub flat_delta_scale: f64,
    /// Overlap of a quick cut (never above 2s)
    pub quick_cut_seconds: f64,
    pub min_bars: u32,
    pub max_bars: u32,
    /// Cue-out position (fraction of duration) when no structure is known
    pub fallback_mix_out_fraction: f64,
    /// Tempo mismatch (percent) below which no correction is applied
    pub float_threshold_percent: f64,
    /// Tempo mismatch (percent) above which stretching is rejected
    pub max_stretch_percent: f64,
    /// Durations for genres not in the table
    pub default_durations: DurationRange,
    /// Genre -> base crossfade durations
    pub genre_durations: BTreeMap<String, DurationRange>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let genre_durations = [
            ("techno", DurationRange::new(16.0, 32.0)),
            ("house", DurationRange::new(16.0, 32.0)),
            ("techhouse", DurationRange::new(16.0, 32.0)),
            ("trance", DurationRange::new(16.0, 32.0)),
            ("progressive", DurationRange::new(16.0, 32.0)),
            ("dnb", DurationRange::new(8.0, 24.0)),
            ("dubstep", DurationRange::new(4.0, 16.0)),
            ("hiphop", DurationRange::new(3.0, 8.0)),
            ("pop", DurationRange::new(3.0, 8.0)),
            ("rnb", DurationRange::new(3.0, 8.0)),
            ("rock", DurationRange::new(2.0, 6.0)),
        ]
        .into_iter()
        .map(|(g, d)| (g.to_string(), d))
        .collect();

        Self {
            low_energy_delta: 0.1,
            high_energy_delta: 0.3,
            flat_energy_delta: 0.03,
            high_delta_scale: 0.5,
            flat_delta_scale: 1.25,
            quick_cut_seconds: 2.0,
            min_bars: 4,
            max_bars: 64,
            fallback_mix_out_fraction: 0.97,
            float_threshold_percent: 0.5,
            max_stretch_percent: 6.0,
            default_durations: DurationRange::new(6.0, 16.0),
            genre_durations,
        }
    }
}

impl PlannerConfig {
    /// Base durations for a pair; mixed genres take the tighter of each bound
    pub fn pair_durations(&self, a: Option<&str>, b: Option<&str>) -> DurationRange {
        let lookup = |g: Option<&str>| {
            g.map(canonical_genre)
                .and_then(|g| self.genre_durations.get(&g).copied())
                .unwrap_or(self.default_durations)
        };
        let (da, db) = (lookup(a), lookup(b));
        DurationRange::new(da.shortest.min(db.shortest), da.longest.min(db.longest))
    }
}

// =============================================================================
// Render
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Encoder executable
    pub ffmpeg_path: PathBuf,
    /// Wall-clock budget for one encoder invocation
    pub step_timeout_seconds: u64,
    /// Integrated loudness target of the final master (LUFS)
    pub loudness_target_lufs: f64,
    pub true_peak_db: f64,
    pub loudness_range: f64,
    /// Final MP3 bitrate
    pub output_bitrate_kbps: u32,
    /// Sample rate of intermediates and the master
    pub sample_rate: u32,
    /// High-pass crossover for the EQ swap (Hz)
    pub eq_crossover_hz: f64,
    /// High-pass sweep bounds for the filter sweep (Hz)
    pub sweep_start_hz: f64,
    pub sweep_end_hz: f64,
    /// Number of discrete steps in the sweep
    pub sweep_steps: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            step_timeout_seconds: 600,
            loudness_target_lufs: -14.0,
            true_peak_db: -1.0,
            loudness_range: 11.0,
            output_bitrate_kbps: 320,
            sample_rate: 44_100,
            eq_crossover_hz: 200.0,
            sweep_start_hz: 20.0,
            sweep_end_hz: 6000.0,
            sweep_steps: 16,
        }
    }
}

impl RenderConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Concurrent sessions; defaults to the CPU count
    pub max_concurrent_sessions: Option<usize>,
    /// Fixed part of a session's wall-clock budget
    pub base_timeout_seconds: u64,
    /// Added to the budget per track
    pub per_track_timeout_seconds: u64,
    /// Finished sessions are discarded after this long
    pub retention_seconds: u64,
    /// Parent directory for per-session temp dirs; system temp when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: None,
            base_timeout_seconds: 120,
            per_track_timeout_seconds: 300,
            retention_seconds: 3600,
            work_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn worker_count(&self) -> usize {
        self.max_concurrent_sessions
            .unwrap_or_else(num_cpus::get)
            .max(1)
    }

    /// Aggregate budget for a session with `track_count` tracks
    pub fn session_timeout(&self, track_count: usize) -> Duration {
        Duration::from_secs(
            self.base_timeout_seconds + self.per_track_timeout_seconds * track_count as u64,
        )
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

/// Normalize a free-form genre tag for table lookups
///
/// Lowercases, drops separators, and folds common aliases
/// ("Drum & Bass" -> "dnb", "Hip-Hop" -> "hiphop", "Tech House" -> "techhouse").
pub fn canonical_genre(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '&')
        .collect();
    match folded.as_str() {
        "drum&bass" | "drumandbass" | "drumnbass" | "dnb" | "d&b" | "jungle" => "dnb".to_string(),
        "hiphop" | "rap" | "trap" => "hiphop".to_string(),
        "r&b" | "rnb" | "randb" => "rnb".to_string(),
        "deephouse" | "house" | "progressivehouse" => "house".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        MixConfig::default().validate().unwrap();
    }

    #[test]
    fn test_canonical_genre_aliases() {
        assert_eq!(canonical_genre("Drum & Bass"), "dnb");
        assert_eq!(canonical_genre("Hip-Hop"), "hiphop");
        assert_eq!(canonical_genre("Tech House"), "techhouse");
        assert_eq!(canonical_genre("TECHNO"), "techno");
    }

    #[test]
    fn test_pair_durations_take_tighter_bounds() {
        let p = PlannerConfig::default();
        let d = p.pair_durations(Some("techno"), Some("hip hop"));
        assert_eq!(d, DurationRange::new(3.0, 8.0));
        let same = p.pair_durations(Some("techno"), Some("Techno"));
        assert_eq!(same, DurationRange::new(16.0, 32.0));
        let unknown = p.pair_durations(None, None);
        assert_eq!(unknown, p.default_durations);
    }

    #[test]
    fn test_pair_tempo_tolerance() {
        let o = OrderingConfig::default();
        assert_eq!(o.pair_tempo_tolerance(Some("techno"), Some("pop")), 3.0);
        assert_eq!(o.pair_tempo_tolerance(None, None), 5.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [planner]
            fallback_mix_out_fraction = 0.9

            [render]
            output_bitrate_kbps = 256
        "#;
        let config: MixConfig = toml::from_str(text).unwrap();
        assert_eq!(config.planner.fallback_mix_out_fraction, 0.9);
        assert_eq!(config.planner.max_bars, 64);
        assert_eq!(config.render.output_bitrate_kbps, 256);
        assert_eq!(config.analysis, AnalysisConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_bars() {
        let mut config = MixConfig::default();
        config.planner.max_bars = 66;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_capacity_must_be_positive() {
        let config: MixConfig = toml::from_str("[analysis]\ncache_capacity = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_timeout_scales_with_tracks() {
        let s = SessionConfig::default();
        assert_eq!(s.session_timeout(2), Duration::from_secs(120 + 600));
    }
}
