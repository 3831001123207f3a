//! Mix rendering through an external encoder

pub mod encoder;
pub mod filtergraph;
pub mod renderer;

pub use encoder::{AudioEncoder, EncodeJob, FfmpegEncoder, JobKind};
pub use renderer::{MixRenderer, RenderOutcome};
