//! Export of mix reports: JSON transition report and cue sheet

pub mod cue;
pub mod json;

pub use cue::write_cue_sheet;
pub use json::{read_report, write_report, MixReport};

use crate::planner::{MixPlan, TransitionPlan};

/// Where each track becomes audible in the rendered mix, plus the mix length
///
/// `transitions` are the plans as rendered, which may differ from
/// `plan.transitions` after a simplified retry.
pub fn timeline(plan: &MixPlan, transitions: &[TransitionPlan]) -> (Vec<f64>, f64) {
    let mut starts = Vec::with_capacity(plan.entries.len());
    // Mix time of the current track's time zero
    let mut head = 0.0;
    for (k, entry) in plan.entries.iter().enumerate() {
        if k == 0 {
            starts.push(0.0);
        }
        if let Some(t) = transitions.get(k) {
            starts.push(head + t.mix_out_point);
            head += t.mix_out_point + t.duration_seconds - t.mix_in_point;
        } else {
            return (starts, head + entry.profile.duration);
        }
    }
    (starts, head)
}
