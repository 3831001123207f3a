//! JSON transition report

use crate::error::{MixError, Result};
use crate::export::timeline;
use crate::planner::{MixPlan, TransitionPlan};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct MixReport {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ReportMetadata,
    /// Tracks in play order
    pub tracks: Vec<TrackReport>,
    /// One entry per transition, as rendered
    pub transitions: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// djmix version that generated this file
    pub generator_version: String,
    pub exported_at: String,
    /// Rendered audio file
    pub output: String,
    pub track_count: usize,
    pub transition_count: usize,
    pub total_duration_seconds: f64,
    /// Path score when the order was chosen by the orderer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_score: Option<f64>,
    /// True when nothing was rendered
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReport {
    pub position: usize,
    pub track_id: i32,
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub bpm: f64,
    pub bpm_confident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub energy: f64,
    pub duration_seconds: f64,
    pub mix_in_point: f64,
    pub mix_out_point: f64,
    /// Where the track becomes audible in the mix
    pub start_in_mix: f64,
}

/// Build the report for a rendered (or planned) mix
pub fn build_report(
    plan: &MixPlan,
    transitions: &[TransitionPlan],
    audio_path: &Path,
    ordering_score: Option<f64>,
    dry_run: bool,
) -> Result<MixReport> {
    let (starts, total) = timeline(plan, transitions);
    let tracks = plan
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let p = &entry.profile;
            let mix_out_point = transitions
                .get(i)
                .map(|t| t.mix_out_point)
                .unwrap_or(entry.mix_out_point);
            TrackReport {
                position: i + 1,
                track_id: p.track_id,
                path: p.source.to_string_lossy().to_string(),
                title: entry.title.clone(),
                artist: p.metadata.artist.clone(),
                genre: p.genre.clone(),
                bpm: p.tempo.bpm,
                bpm_confident: p.tempo.is_confident(),
                key: p.key.map(|k| k.to_string()),
                energy: p.energy,
                duration_seconds: p.duration,
                mix_in_point: entry.mix_in_point,
                mix_out_point,
                start_in_mix: starts.get(i).copied().unwrap_or(0.0),
            }
        })
        .collect();

    let transitions_json = transitions
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MixError::OutputError {
            path: audio_path.to_path_buf(),
            reason: format!("cannot serialize transitions: {}", e),
        })?;

    Ok(MixReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ReportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            output: audio_path.to_string_lossy().to_string(),
            track_count: plan.entries.len(),
            transition_count: transitions.len(),
            total_duration_seconds: total,
            ordering_score,
            dry_run,
        },
        tracks,
        transitions: transitions_json,
    })
}

/// Write a report to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_report(report: &MixReport, output_path: &Path) -> Result<()> {
    // Write to temp file in same directory (ensures same filesystem for atomic rename)
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| MixError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).map_err(|e| {
        // Clean up temp file on error
        let _ = std::fs::remove_file(&temp_path);
        MixError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    // Atomic rename: either succeeds completely or fails without modifying target
    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MixError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!(
        "Wrote report for {} tracks to {}",
        report.tracks.len(),
        output_path.display()
    );

    Ok(())
}

/// Read a previously written report
pub fn read_report(path: &Path) -> Result<MixReport> {
    let file = File::open(path).map_err(|_| MixError::FileNotFound(path.to_path_buf()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| MixError::InvalidRequest(format!(
        "cannot parse report {}: {}",
        path.display(),
        e
    )))
}
