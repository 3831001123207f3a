//! Configuration and CLI handling

pub mod cli;
pub mod settings;
pub mod tuning;

pub use cli::Cli;
pub use settings::Settings;
pub use tuning::{
    canonical_genre, AnalysisConfig, DurationRange, MixConfig, OrderingConfig, PlannerConfig,
    RenderConfig, SessionConfig,
};
