//! Cue sheet export
//!
//! One TRACK per mix entry, indexed at the point where that track becomes
//! audible. Cue times are MM:SS:FF with 75 frames per second.

use crate::error::{MixError, Result};
use crate::export::timeline;
use crate::planner::{MixPlan, TransitionPlan};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

const FRAMES_PER_SECOND: f64 = 75.0;

/// Format seconds as a cue timestamp
pub fn cue_time(seconds: f64) -> String {
    let frames_total = (seconds.max(0.0) * FRAMES_PER_SECOND).round() as u64;
    let frames = frames_total % 75;
    let total_seconds = frames_total / 75;
    format!("{:02}:{:02}:{:02}", total_seconds / 60, total_seconds % 60, frames)
}

/// Quotes are not allowed inside cue strings
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "'"))
}

/// Render the cue sheet text for a mix written to `audio_path`
pub fn cue_sheet(plan: &MixPlan, transitions: &[TransitionPlan], audio_path: &Path) -> String {
    let (starts, _) = timeline(plan, transitions);
    let file_name = audio_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| audio_path.to_string_lossy().to_string());

    let mut out = String::new();
    let _ = writeln!(out, "REM GENERATOR {}", quoted(&format!("djmix {}", env!("CARGO_PKG_VERSION"))));
    let _ = writeln!(out, "TITLE {}", quoted(&file_name));
    let _ = writeln!(out, "FILE {} MP3", quoted(&file_name));
    for (i, entry) in plan.entries.iter().enumerate() {
        let _ = writeln!(out, "  TRACK {:02} AUDIO", i + 1);
        let _ = writeln!(out, "    TITLE {}", quoted(&entry.title));
        if let Some(artist) = &entry.profile.metadata.artist {
            let _ = writeln!(out, "    PERFORMER {}", quoted(artist));
        }
        if let Some(key) = entry.profile.key {
            let _ = writeln!(out, "    REM KEY {}", key);
        }
        if entry.profile.tempo.is_confident() {
            let _ = writeln!(out, "    REM BPM {:.1}", entry.profile.tempo.bpm);
        }
        let start = starts.get(i).copied().unwrap_or(0.0);
        let _ = writeln!(out, "    INDEX 01 {}", cue_time(start));
    }
    out
}

/// Write the cue sheet next to the mix
pub fn write_cue_sheet(
    plan: &MixPlan,
    transitions: &[TransitionPlan],
    audio_path: &Path,
    cue_path: &Path,
) -> Result<()> {
    let text = cue_sheet(plan, transitions, audio_path);
    let temp_path = cue_path.with_extension("cue.tmp");
    std::fs::write(&temp_path, text).map_err(|e| MixError::output_error(cue_path, e))?;
    std::fs::rename(&temp_path, cue_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MixError::output_error(cue_path, e)
    })?;
    info!("Wrote cue sheet to {}", cue_path.display());
    Ok(())
}
