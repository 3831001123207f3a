//! djmix CLI entry point

use clap::Parser;
use djmix::config::{Cli, Settings};
use djmix::pipeline;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Build settings from CLI and the tuning file
    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline::run(&settings) {
        Ok(result) => {
            println!();
            match &result.output {
                Some(path) => println!(
                    "Mixed {} tracks with {} transitions ({}:{:02}) into {}",
                    result.track_count,
                    result.transition_count,
                    result.total_duration_seconds as u64 / 60,
                    result.total_duration_seconds as u64 % 60,
                    path.display()
                ),
                None => println!(
                    "Planned {} tracks with {} transitions (nothing rendered)",
                    result.track_count, result.transition_count
                ),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    // Check input exists
    if !cli.input.exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Examples:\n    djmix -i ./set.json -o ./mix.mp3\n    djmix -i ~/Music/tonight -o ./tonight.mp3 --energy-curve peak",
            cli.input.display()
        ));
    }

    // The output's parent must exist; the file itself is created on success
    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output directory does not exist: {}\n\n  Tip: Create it first.\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    if cli.output.is_dir() {
        return Err(format!(
            "Output must be a file path, not a directory: {}\n\n  Tip: Example: -o {}/mix.mp3",
            cli.output.display(),
            cli.output.display()
        ));
    }

    Ok(())
}
