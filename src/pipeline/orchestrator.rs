//! Pipeline orchestration
//!
//! Coordinates request building, analysis, planning, rendering and report
//! export for one CLI run. Analysis runs on the rayon pool; rendering runs
//! on a tokio runtime owned by this module.

use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{MixError, Result};
use crate::export;
use crate::render::FfmpegEncoder;
use crate::session::{MixEngine, MixOutput, PreparedMix, ProgressTracker};
use crate::types::{MixRequest, TrackInput};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pipeline result summary
#[derive(Debug)]
pub struct PipelineResult {
    pub track_count: usize,
    pub transition_count: usize,
    pub total_duration_seconds: f64,
    /// Rendered file; `None` in dry-run mode
    pub output: Option<PathBuf>,
}

/// Run the full pipeline
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    let pipeline_start = Instant::now();

    // Configure thread pool
    configure_thread_pool(settings.analysis_threads)?;

    let request = build_request(settings)?;
    info!("Mix request with {} tracks", request.tracks.len());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| MixError::ConfigError(format!("Failed to start async runtime: {}", e)))?;
    let result = runtime.block_on(run_request(settings, request));

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );
    result
}

/// Build the mix request from the input path
///
/// A `.json` input is a serialized request; CLI ordering flags add to it.
/// A directory is scanned and always ordered; unreadable files are skipped.
/// A single audio file makes a one-track mix.
pub fn build_request(settings: &Settings) -> Result<MixRequest> {
    let input = &settings.input;
    let is_json = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut request = if is_json {
        let mut request = read_request(input)?;
        request.order |= settings.order;
        request
    } else {
        let files = discovery::scan(input, settings.recursive)?;
        let mut request = MixRequest::new(files.iter().map(|f| TrackInput::from_path(&f.path)).collect());
        if input.is_dir() {
            log_formats(&files);
            request.order = true;
            request.skip_unreadable = true;
        } else {
            request.order = settings.order;
        }
        request
    };

    if settings.energy_curve.is_some() {
        request.energy_curve = settings.energy_curve;
    }
    if settings.seed.is_some() {
        request.seed = settings.seed;
    }
    if let Some(genre) = &settings.genre_hint {
        for track in request.tracks.iter_mut().filter(|t| t.genre.is_none()) {
            track.genre = Some(genre.clone());
        }
    }

    if request.tracks.is_empty() {
        return Err(MixError::InvalidRequest(format!(
            "no tracks found in {}\n  Tip: Pass a request file, a directory of MP3/WAV/FLAC/AIFF files, or a single audio file",
            input.display()
        )));
    }
    Ok(request)
}

fn read_request(path: &Path) -> Result<MixRequest> {
    let text = std::fs::read_to_string(path).map_err(|_| MixError::FileNotFound(path.to_path_buf()))?;
    let mut request: MixRequest = serde_json::from_str(&text).map_err(|e| {
        MixError::InvalidRequest(format!("cannot parse {}: {}", path.display(), e))
    })?;

    // Relative sources are relative to the request file
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for track in request.tracks.iter_mut() {
        if track.source.is_relative() {
            track.source = base.join(&track.source);
        }
    }
    Ok(request)
}

fn log_formats(files: &[DiscoveredFile]) {
    use std::collections::BTreeMap;

    let mut by_format: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for file in files {
        let slot = by_format.entry(file.format.as_str()).or_default();
        slot.0 += 1;
        slot.1 += file.size_bytes;
    }
    for (format, (count, bytes)) in by_format {
        debug!("  {} {} files ({:.1} MB)", count, format, bytes as f64 / 1_048_576.0);
    }
}

async fn run_request(settings: &Settings, request: MixRequest) -> Result<PipelineResult> {
    let encoder = FfmpegEncoder::new(settings.mix.render.ffmpeg_path.clone());
    if !settings.dry_run {
        encoder.check_available().await?;
    }
    let engine = MixEngine::new(settings.mix.clone(), Arc::new(encoder));

    // Phase 1: Analysis and planning
    let analysis_start = Instant::now();
    let spinner = spinner(settings, format!("Analyzing {} tracks", request.tracks.len()));
    let prepared = engine.prepare(&request).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let prepared = prepared?;
    info!(
        "Analysis and planning completed in {:.2}s",
        analysis_start.elapsed().as_secs_f64()
    );

    if settings.dry_run {
        return run_dry_run(&prepared, settings);
    }

    // Phase 2: Rendering
    let render_start = Instant::now();
    let output = render_with_progress(&engine, &prepared, settings).await?;
    info!(
        "Rendering completed in {:.2}s",
        render_start.elapsed().as_secs_f64()
    );

    // Phase 3: Reports
    if settings.write_reports {
        export_reports(&prepared, &output, settings)?;
    }

    Ok(PipelineResult {
        track_count: prepared.plan.entries.len(),
        transition_count: output.transition_count,
        total_duration_seconds: output.total_duration_seconds,
        output: Some(output.path),
    })
}

async fn render_with_progress(
    engine: &MixEngine,
    prepared: &PreparedMix,
    settings: &Settings,
) -> Result<MixOutput> {
    let (tracker, _status) = ProgressTracker::new(Uuid::new_v4());
    let cancel = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the render");
                cancel.cancel();
            }
        })
    };

    let bar_task = if settings.show_progress {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        let mut status = tracker.subscribe();
        Some(tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let snapshot = status.borrow_and_update().clone();
                pb.set_position(snapshot.progress_percent.round() as u64);
                pb.set_message(snapshot.progress_message);
                if snapshot.state.is_terminal() {
                    break;
                }
            }
            pb.finish_and_clear();
        }))
    } else {
        None
    };

    let result = engine
        .render(prepared, &settings.output, &tracker, cancel)
        .await;

    interrupt.abort();
    drop(tracker);
    if let Some(task) = bar_task {
        let _ = task.await;
    }
    result
}

fn export_reports(prepared: &PreparedMix, output: &MixOutput, settings: &Settings) -> Result<()> {
    let score = prepared.ordering.as_ref().map(|o| o.total_score);
    let report = export::json::build_report(
        &prepared.plan,
        &output.transitions,
        &output.path,
        score,
        false,
    )?;
    export::write_report(&report, &settings.report_path())?;
    export::write_cue_sheet(
        &prepared.plan,
        &output.transitions,
        &output.path,
        &settings.cue_path(),
    )
}

fn spinner(settings: &Settings, message: String) -> Option<ProgressBar> {
    if !settings.show_progress {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

/// Dry run mode - print the plan without rendering
fn run_dry_run(prepared: &PreparedMix, settings: &Settings) -> Result<PipelineResult> {
    let plan = &prepared.plan;

    println!();
    println!("=== DRY RUN MODE ===");
    println!();

    if let Some(ordering) = &prepared.ordering {
        println!("Harmonic order (score {:.1}):", ordering.total_score);
    } else {
        println!("Request order:");
    }
    for (i, entry) in plan.entries.iter().enumerate() {
        let p = &entry.profile;
        let key = p.key.map(|k| k.to_string()).unwrap_or_else(|| "?".to_string());
        let tempo = if p.tempo.is_confident() {
            format!("{:.1} BPM", p.tempo.bpm)
        } else {
            "? BPM".to_string()
        };
        println!(
            "  {:>2}. {} ({}, {}, energy {:.2})  in {}  out {}",
            i + 1,
            entry.title,
            key,
            tempo,
            p.energy,
            clock(entry.mix_in_point),
            clock(entry.mix_out_point)
        );
        if let Some(t) = plan.transitions.get(i) {
            let stretch = t
                .tempo_stretch
                .map(|f| format!(", stretch x{:.3}", f))
                .unwrap_or_default();
            println!(
                "      -> {} over {} bars ({:.1}s), rule {}, {}{}",
                t.style,
                t.duration_bars,
                t.duration_seconds,
                t.rationale.rule,
                t.rationale.harmonic_relation.label(),
                stretch
            );
            for note in &t.rationale.notes {
                println!("         note: {}", note);
            }
        }
    }

    println!();
    println!("─────────────────────────────────────────");
    println!();
    println!("Expected mix length: {}", clock(plan.expected_duration()));
    println!();
    println!("Would create:");
    println!("  {}", settings.output.display());
    if settings.write_reports {
        println!("  {}", settings.report_path().display());
        println!("  {}", settings.cue_path().display());
    }
    println!();

    Ok(PipelineResult {
        track_count: plan.entries.len(),
        transition_count: plan.transitions.len(),
        total_duration_seconds: plan.expected_duration(),
        output: None,
    })
}

fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // If the pool is already initialized (e.g., in tests), that's OK
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(MixError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}
