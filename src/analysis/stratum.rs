//! Stratum-DSP based tempo and key estimation
//!
//! One `analyze_audio` pass yields both tempo and key, so a single estimator
//! covers both instead of decoding the track's features twice.

use crate::analysis::key::{to_camelot, CamelotKey};
use crate::analysis::traits::{TempoKeyEstimate, TempoKeyEstimator};
use crate::error::{MixError, Result};
use crate::types::{AudioBuffer, Mode, PitchClass};
use stratum_dsp::{analyze_audio, AnalysisConfig, Key};
use tracing::debug;

/// Tempo/key estimator using stratum-dsp
pub struct StratumEstimator;

impl StratumEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StratumEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoKeyEstimator for StratumEstimator {
    fn estimate(&self, buffer: &AudioBuffer) -> Result<TempoKeyEstimate> {
        debug!(
            "Estimating tempo/key with stratum-dsp ({} samples, {}Hz)",
            buffer.len(),
            buffer.sample_rate
        );

        let result = analyze_audio(&buffer.samples, buffer.sample_rate, AnalysisConfig::default())
            .map_err(|e| MixError::AnalysisError {
                path: std::path::PathBuf::new(),
                reason: format!("Tempo/key estimation failed: {}", e),
            })?;

        let bpm = result.bpm as f64;
        let key = camelot_from_stratum(&result.key);

        debug!(
            "Estimated {:.2} BPM (confidence {:.2}), key {} (confidence {:.2})",
            bpm,
            result.bpm_confidence,
            key.map(|k| k.to_string()).unwrap_or_else(|| "-".to_string()),
            result.key_confidence
        );

        Ok(TempoKeyEstimate {
            bpm: (bpm.is_finite() && bpm > 0.0).then_some(bpm),
            bpm_confidence: result.bpm_confidence as f64,
            key,
            key_confidence: result.key_confidence as f64,
        })
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

fn camelot_from_stratum(key: &Key) -> Option<CamelotKey> {
    let (pitch_idx, mode) = match key {
        Key::Major(idx) => (*idx, Mode::Major),
        Key::Minor(idx) => (*idx, Mode::Minor),
    };
    PitchClass::from_index(pitch_idx as u8).map(|pitch| to_camelot(pitch, mode))
}
