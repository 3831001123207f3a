//! CLI argument parsing

use crate::ordering::EnergyCurve;
use clap::Parser;
use std::path::PathBuf;

/// djmix - Harmonic DJ mix renderer
///
/// Analyzes a set of tracks, optionally orders them for harmonic and tempo
/// compatibility, plans a phrase-aligned transition between each pair and
/// renders one continuous, loudness-normalized MP3 through ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "djmix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input: a JSON mix request, a directory of audio files, or one file
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output MP3 path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Tuning file (TOML); defaults to the platform config directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Let the harmonic orderer choose the track sequence
    #[arg(long, default_value = "false")]
    pub order: bool,

    /// Target energy shape when ordering
    #[arg(long, value_name = "CURVE")]
    pub energy_curve: Option<EnergyCurve>,

    /// Seed for tie-breaking variety in ordering
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Genre for tracks that carry no genre tag
    #[arg(long, value_name = "GENRE")]
    pub genre: Option<String>,

    /// Number of analysis threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Do not descend into subdirectories of a directory input
    #[arg(long, default_value = "false")]
    pub no_recursive: bool,

    /// Skip the JSON transition report and cue sheet
    #[arg(long, default_value = "false")]
    pub no_report: bool,

    /// Path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Dry run - print the planned mix without rendering
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "djmix",
            "-i",
            "set.json",
            "-o",
            "mix.mp3",
            "--order",
            "--energy-curve",
            "peak",
            "--seed",
            "7",
            "-vv",
        ])
        .unwrap();
        assert!(cli.order);
        assert_eq!(cli.energy_curve, Some(EnergyCurve::Peak));
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_rejects_unknown_curve() {
        assert!(Cli::try_parse_from(["djmix", "-i", "a", "-o", "b", "--energy-curve", "zigzag"]).is_err());
    }
}
