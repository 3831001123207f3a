//! djmix - Harmonic DJ mix transition engine
//!
//! Turns a set of audio tracks into one continuous DJ-style mix: each track
//! is analyzed for tempo, key, energy and phrase structure, the set is
//! optionally reordered for harmonic compatibility, a transition is planned
//! for every adjacent pair, and the mix is rendered by folding the tracks
//! together through ffmpeg.
//!
//! # Architecture
//!
//! - `analysis`: Structural analyzer (beat grid, segments, energy) and profile cache
//! - `ordering`: Harmonic orderer over pairwise compatibility scores
//! - `planner`: Rule-table transition planner with phrase-aligned durations
//! - `render`: Encoder seam and left-fold renderer
//! - `session`: Session lifecycle, status, workspaces and concurrency limits
//! - `export`: JSON transition report and cue sheet
//! - `config`: CLI arguments, runtime settings and the tuning file
//! - `pipeline`: CLI orchestration
//!
//! # Example
//!
//! ```no_run
//! use djmix::{config::Settings, pipeline};
//!
//! let settings = Settings::default();
//! let result = pipeline::run(&settings).expect("Mix failed");
//! println!("Rendered {} transitions", result.transition_count);
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod ordering;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod session;
pub mod types;

// Re-export key types at crate root
pub use error::{MixError, Result};
pub use planner::{MixPlan, TransitionPlan, TransitionStyle};
pub use session::{MixEngine, SessionManager, SessionState, SessionStatus};
pub use types::{MixRequest, TrackInput, TrackProfile};
