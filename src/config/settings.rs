//! Runtime configuration settings

use crate::config::tuning::MixConfig;
use crate::error::Result;
use crate::ordering::EnergyCurve;
use std::path::PathBuf;

/// Runtime settings for one CLI run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Request file, audio directory or single audio file
    pub input: PathBuf,
    /// Destination MP3
    pub output: PathBuf,
    /// Tuning tree, with CLI overrides applied
    pub mix: MixConfig,
    /// Run the harmonic orderer
    pub order: bool,
    pub energy_curve: Option<EnergyCurve>,
    pub seed: Option<u64>,
    /// Genre applied to tracks without one
    pub genre_hint: Option<String>,
    /// Number of analysis worker threads
    pub analysis_threads: usize,
    /// Scan directory inputs recursively
    pub recursive: bool,
    /// Write the JSON report and cue sheet next to the output
    pub write_reports: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// Dry run mode - plan without rendering
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments and the resolved tuning file
    pub fn from_cli(cli: &super::cli::Cli) -> Result<Self> {
        let mut mix = MixConfig::resolve(cli.config.as_deref())?;
        if let Some(ffmpeg) = &cli.ffmpeg {
            mix.render.ffmpeg_path = ffmpeg.clone();
        }

        // Leave one core for the runtime driving the encoder
        let default_threads = num_cpus::get().saturating_sub(1).max(1);
        let analysis_threads = cli.threads.unwrap_or(default_threads).max(1);

        Ok(Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            mix,
            order: cli.order,
            energy_curve: cli.energy_curve,
            seed: cli.seed,
            genre_hint: cli.genre.clone(),
            analysis_threads,
            recursive: !cli.no_recursive,
            write_reports: !cli.no_report,
            show_progress: !cli.quiet,
            dry_run: cli.dry_run,
        })
    }

    /// JSON transition report path (`mix.mp3` -> `mix.json`)
    pub fn report_path(&self) -> PathBuf {
        self.output.with_extension("json")
    }

    /// Cue sheet path (`mix.mp3` -> `mix.cue`)
    pub fn cue_path(&self) -> PathBuf {
        self.output.with_extension("cue")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("./mix.mp3"),
            mix: MixConfig::default(),
            order: false,
            energy_curve: None,
            seed: None,
            genre_hint: None,
            analysis_threads: num_cpus::get().saturating_sub(1).max(1),
            recursive: true,
            write_reports: true,
            show_progress: true,
            dry_run: false,
        }
    }
}
