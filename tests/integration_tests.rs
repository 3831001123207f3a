//! Integration tests for the djmix engine
//!
//! Planner scenarios and ordering run on in-memory profiles. Session tests
//! analyze real WAV fixtures and render through in-process encoders, so no
//! ffmpeg is needed except for the ignored end-to-end test.

use async_trait::async_trait;
use djmix::analysis::{is_contiguous_cover, CamelotKey, StructuralAnalyzer, TempoKeyEstimate, TempoKeyEstimator};
use djmix::config::{DurationRange, MixConfig, Settings};
use djmix::error::{MixError, Result};
use djmix::ordering::{EnergyCurve, HarmonicOrderer};
use djmix::planner::{TransitionPlan, TransitionPlanner, TransitionStyle};
use djmix::render::{AudioEncoder, EncodeJob, FfmpegEncoder, JobKind};
use djmix::session::{MixEngine, ProgressTracker, SessionManager, SessionState};
use djmix::types::{AudioBuffer, MixRequest, Segment, SegmentKind, Tempo, TrackInput, TrackProfile};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// =============================================================================
// Fixtures
// =============================================================================

/// Generate a click track WAV file
///
/// Creates impulses (short bursts) at regular intervals matching the given BPM.
fn generate_click_track(path: &Path, bpm: f32, duration_secs: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    let impulse_samples = (0.005 * sample_rate as f32) as usize;

    for i in 0..num_samples {
        let position_in_beat = i % samples_per_beat;
        let sample = if position_in_beat < impulse_samples {
            let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
            0.8 * decay
        } else {
            0.0
        };
        writer
            .write_sample((sample * 32767.0) as i16)
            .expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

/// Estimator that never finds anything; request hints carry tempo and key
struct HintsOnly;

impl TempoKeyEstimator for HintsOnly {
    fn estimate(&self, _buffer: &AudioBuffer) -> Result<TempoKeyEstimate> {
        Ok(TempoKeyEstimate::empty())
    }

    fn name(&self) -> &'static str {
        "hints-only"
    }
}

const TRACK_SECONDS: f64 = 90.0;

/// Three-part structure with `edge`-second first and last segments
fn edged_segments(duration: f64, edge: f64, first: SegmentKind, last: SegmentKind) -> Vec<Segment> {
    vec![
        Segment::new(first, 0.0, edge, 0.5),
        Segment::new(SegmentKind::Verse, edge, duration - edge, 0.7),
        Segment::new(last, duration - edge, duration, 0.5),
    ]
}

fn structured_segments(duration: f64, first: SegmentKind, last: SegmentKind) -> Vec<Segment> {
    edged_segments(duration, 48.0, first, last)
}

/// Write a click-track fixture and a fully hinted request entry for it
fn fixture_track(dir: &Path, name: &str, bpm: f64, key: &str) -> TrackInput {
    let path = dir.join(format!("{}.wav", name));
    generate_click_track(&path, bpm as f32, TRACK_SECONDS as f32, 22050);
    TrackInput {
        source: path,
        tempo_bpm: Some(bpm),
        key: Some(key.to_string()),
        energy: Some(0.6),
        genre: Some("techno".to_string()),
        segments: Some(edged_segments(TRACK_SECONDS, 30.0, SegmentKind::Intro, SegmentKind::Outro)),
        beat_grid: None,
    }
}

fn fixture_request(dir: &Path) -> MixRequest {
    MixRequest::new(vec![
        fixture_track(dir, "one", 126.0, "8A"),
        fixture_track(dir, "two", 127.0, "9A"),
        fixture_track(dir, "three", 128.0, "9A"),
    ])
}

fn profile(name: &str, key: Option<&str>, tempo: Tempo, energy: f64, duration: f64, segments: Vec<Segment>) -> TrackProfile {
    let mut p = TrackProfile::from_parts(
        format!("/music/{}.wav", name),
        duration,
        tempo,
        key.and_then(CamelotKey::parse),
        energy,
        Some("techno"),
        segments,
    );
    p.metadata.title = Some(name.to_string());
    p
}

fn assert_feasible(plan: &TransitionPlan, from: &TrackProfile) {
    assert_eq!(plan.duration_bars % 4, 0, "bars not phrase aligned: {:?}", plan);
    assert!((4..=64).contains(&plan.duration_bars));
    let available = (from.duration - plan.mix_out_point).min(plan.mix_in_point);
    assert!(
        plan.duration_seconds <= available + 1e-9,
        "overlap {:.3}s exceeds available {:.3}s",
        plan.duration_seconds,
        available
    );
}

// =============================================================================
// Planner scenarios
// =============================================================================

#[test]
fn test_same_key_techno_gets_longest_exponential_blend() {
    let a = profile("a", Some("8A"), Tempo::confident(128.0), 0.7, 360.0, structured_segments(360.0, SegmentKind::Intro, SegmentKind::Outro));
    let b = profile("b", Some("8A"), Tempo::confident(128.2), 0.7, 360.0, structured_segments(360.0, SegmentKind::Intro, SegmentKind::Outro));
    let planner = TransitionPlanner::from_config(&MixConfig::default());
    let plan = planner.plan_pair(0, &a, &b, 0.0);

    assert_eq!(plan.style, TransitionStyle::ExponentialBlend);
    // Longest techno overlap is 32 s; at 128.1 BPM that is 17.1 bars -> 16
    assert_eq!(plan.duration_bars, 16);
    assert!(plan.rationale.notes.iter().all(|n| !n.contains("shrunk")));
    assert_eq!(plan.tempo_stretch, None);
    assert_feasible(&plan, &a);
}

#[test]
fn test_drop_to_drop_is_quick_cut() {
    let a = profile("a", Some("8A"), Tempo::confident(128.0), 0.8, 300.0, structured_segments(300.0, SegmentKind::Intro, SegmentKind::Drop));
    let b = profile("b", Some("3B"), Tempo::confident(128.0), 0.8, 300.0, structured_segments(300.0, SegmentKind::Drop, SegmentKind::Outro));
    let plan = TransitionPlanner::from_config(&MixConfig::default()).plan_pair(0, &a, &b, 0.0);

    assert_eq!(plan.style, TransitionStyle::QuickCut);
    assert!(plan.duration_seconds <= 2.0);
    assert_eq!(plan.tempo_stretch, None);
}

#[test]
fn test_breakdown_to_buildup_is_filter_sweep() {
    let a = profile("a", Some("5A"), Tempo::confident(126.0), 0.5, 300.0, structured_segments(300.0, SegmentKind::Intro, SegmentKind::Breakdown));
    let b = profile("b", Some("5A"), Tempo::confident(126.0), 0.6, 300.0, structured_segments(300.0, SegmentKind::Buildup, SegmentKind::Outro));
    let plan = TransitionPlanner::from_config(&MixConfig::default()).plan_pair(0, &a, &b, 0.0);

    assert_eq!(plan.style, TransitionStyle::FilterSweep);
    assert_feasible(&plan, &a);
}

#[test]
fn test_unknown_tempo_track_gets_lowest_certainty_score() {
    let config = MixConfig::default();
    let known = |name: &str, key: &str, bpm: f64| {
        Arc::new(profile(name, Some(key), Tempo::confident(bpm), 0.6, 300.0, structured_segments(300.0, SegmentKind::Intro, SegmentKind::Outro)))
    };
    let mystery = Arc::new(profile("mystery", None, Tempo::uncertain(0.0), 0.4, 240.0, Vec::new()));
    assert!(mystery.is_unstructured());

    let profiles = vec![known("a", "8A", 126.0), mystery, known("b", "9A", 127.0)];
    let result = HarmonicOrderer::new(config.ordering.clone()).order(&profiles, None, None);

    let mut seen = result.permutation.clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2]);

    let mystery_pos = result.permutation.iter().position(|&i| i == 1).unwrap();
    let touching: Vec<usize> = [mystery_pos.checked_sub(1), Some(mystery_pos)]
        .into_iter()
        .flatten()
        .filter(|&p| p < result.pairs.len())
        .collect();
    assert!(!touching.is_empty());
    for p in touching {
        assert_eq!(result.pairs[p].harmonic, config.ordering.low_certainty_score);
    }

    // The planner still produces a feasible plan into and out of it
    let ordered: Vec<_> = result.permutation.iter().map(|&i| Arc::clone(&profiles[i])).collect();
    let mix = TransitionPlanner::from_config(&config).plan_mix(&ordered);
    for (k, t) in mix.transitions.iter().enumerate() {
        assert_feasible(t, &ordered[k]);
    }
}

#[test]
fn test_long_dnb_request_is_shrunk_to_fit() {
    let mut config = MixConfig::default();
    // 64 bars at 174 BPM
    let bar = 240.0 / 174.0;
    config.planner.default_durations = DurationRange::new(64.0 * bar, 64.0 * bar);
    config.planner.genre_durations.clear();

    let segments = |d: f64| {
        vec![
            Segment::new(SegmentKind::Intro, 0.0, 20.0, 0.5),
            Segment::new(SegmentKind::Verse, 20.0, d - 20.0, 0.7),
            Segment::new(SegmentKind::Outro, d - 20.0, d, 0.5),
        ]
    };
    let a = profile("a", Some("8A"), Tempo::confident(174.0), 0.7, 120.0, segments(120.0));
    let b = profile("b", Some("8A"), Tempo::confident(174.0), 0.7, 100.0, segments(100.0));
    let plan = TransitionPlanner::from_config(&config).plan_pair(0, &a, &b, 0.0);

    assert!(plan.duration_bars < 64);
    assert!(plan.rationale.notes.iter().any(|n| n.contains("shrunk")));
    assert_feasible(&plan, &a);
}

#[test]
fn test_every_plan_is_feasible_across_a_mixed_set() {
    let config = MixConfig::default();
    let kinds = [SegmentKind::Intro, SegmentKind::Drop, SegmentKind::Breakdown, SegmentKind::Buildup, SegmentKind::Outro];
    let keys = ["8A", "9B", "3A", "12B", "5A"];
    let profiles: Vec<Arc<TrackProfile>> = (0..10)
        .map(|i| {
            let duration = 120.0 + 37.0 * i as f64;
            let segs = structured_segments(duration, kinds[i % 5], kinds[(i + 2) % 5]);
            Arc::new(profile(&format!("t{}", i), Some(keys[i % 5]), Tempo::confident(120.0 + 3.0 * i as f64), 0.1 * i as f64, duration, segs))
        })
        .collect();

    let mix = TransitionPlanner::from_config(&config).plan_mix(&profiles);
    assert_eq!(mix.transitions.len(), 9);
    for (k, t) in mix.transitions.iter().enumerate() {
        assert_feasible(t, &profiles[k]);
        assert!(mix.entries[k].mix_in_point <= mix.entries[k].mix_out_point);
    }
}

// =============================================================================
// Ordering and determinism
// =============================================================================

fn ordering_set() -> Vec<Arc<TrackProfile>> {
    let specs = [
        ("a", "1A", 122.0, 0.3),
        ("b", "8B", 128.0, 0.9),
        ("c", "2A", 123.0, 0.4),
        ("d", "8A", 127.0, 0.8),
        ("e", "12A", 121.0, 0.2),
        ("f", "3A", 124.0, 0.5),
    ];
    specs
        .iter()
        .map(|(name, key, bpm, energy)| {
            Arc::new(profile(name, Some(key), Tempo::confident(*bpm), *energy, 300.0, structured_segments(300.0, SegmentKind::Intro, SegmentKind::Outro)))
        })
        .collect()
}

#[test]
fn test_order_beats_identity_and_reverse() {
    let profiles = ordering_set();
    let orderer = HarmonicOrderer::new(MixConfig::default().ordering);
    for curve in [None, Some(EnergyCurve::Rising), Some(EnergyCurve::Peak), Some(EnergyCurve::Wave)] {
        let result = orderer.order(&profiles, curve, None);
        let identity: Vec<usize> = (0..profiles.len()).collect();
        let reverse: Vec<usize> = identity.iter().rev().copied().collect();
        assert!(result.total_score + 1e-9 >= orderer.path_score(&profiles, &identity, curve));
        assert!(result.total_score + 1e-9 >= orderer.path_score(&profiles, &reverse, curve));
    }
}

#[test]
fn test_planning_is_deterministic() {
    let profiles = ordering_set();
    let config = MixConfig::default();
    let run = || {
        let order = HarmonicOrderer::new(config.ordering.clone()).order(&profiles, Some(EnergyCurve::Rising), Some(42));
        let ordered: Vec<_> = order.permutation.iter().map(|&i| Arc::clone(&profiles[i])).collect();
        let plan = TransitionPlanner::from_config(&config).plan_mix(&ordered);
        (
            serde_json::to_string(&order).unwrap(),
            serde_json::to_string(&plan).unwrap(),
        )
    };
    assert_eq!(run(), run());
}

// =============================================================================
// Analysis
// =============================================================================

#[test]
fn test_analyzer_segments_cover_track() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("click.wav");
    generate_click_track(&path, 120.0, 40.0, 22050);

    let analyzer = StructuralAnalyzer::new(MixConfig::default().analysis, Arc::new(HintsOnly));
    let mut input = TrackInput::from_path(&path);
    input.tempo_bpm = Some(120.0);
    input.key = Some("7A".to_string());
    let profile = analyzer.analyze(&input).unwrap();

    assert!((profile.duration - 40.0).abs() < 0.1);
    assert!(is_contiguous_cover(&profile.segments, profile.duration));
    assert_eq!(profile.key, CamelotKey::parse("7A"));
}

#[test]
fn test_analyzer_without_tempo_returns_unknown_structure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("click.wav");
    generate_click_track(&path, 120.0, 20.0, 22050);

    let analyzer = StructuralAnalyzer::new(MixConfig::default().analysis, Arc::new(HintsOnly));
    let profile = analyzer.analyze(&TrackInput::from_path(&path)).unwrap();

    assert!(!profile.tempo.is_confident());
    assert!(profile.is_unstructured());
    assert!(profile.beat_grid.is_empty());
    assert!(is_contiguous_cover(&profile.segments, profile.duration));
}

// =============================================================================
// Sessions with in-process encoders
// =============================================================================

/// Writes a placeholder for every job; fails the jobs `fail` selects
struct FakeEncoder {
    fail: Box<dyn Fn(JobKind) -> bool + Send + Sync>,
    jobs: Mutex<Vec<JobKind>>,
    /// Most files seen in the workspace when a job starts
    max_workspace_files: Mutex<usize>,
}

impl FakeEncoder {
    fn new(fail: impl Fn(JobKind) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            fail: Box::new(fail),
            jobs: Mutex::new(Vec::new()),
            max_workspace_files: Mutex::new(0),
        })
    }

    fn jobs(&self) -> Vec<JobKind> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    async fn run(&self, job: &EncodeJob, _timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        self.jobs.lock().push(job.kind);
        if let Some(dir) = job.output.parent() {
            let count = std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0);
            let mut max = self.max_workspace_files.lock();
            *max = (*max).max(count);
        }
        if cancel.is_cancelled() {
            return Err(MixError::Cancelled);
        }
        if (self.fail)(job.kind) {
            return Err(MixError::EncoderFailed {
                job: job.kind.to_string(),
                reason: "synthetic failure".to_string(),
            });
        }
        tokio::fs::write(&job.output, b"audio").await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Never finishes on its own
struct StallingEncoder;

#[async_trait]
impl AudioEncoder for StallingEncoder {
    async fn run(&self, job: &EncodeJob, _timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        tokio::fs::write(&job.output, b"partial").await?;
        tokio::select! {
            _ = cancel.cancelled() => Err(MixError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

struct SessionFixture {
    dir: TempDir,
    work: PathBuf,
    destination: PathBuf,
}

impl SessionFixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        let destination = dir.path().join("out").join("mix.mp3");
        Self { dir, work, destination }
    }

    fn config(&self) -> MixConfig {
        let mut config = MixConfig::default();
        config.session.work_dir = Some(self.work.clone());
        config
    }

    fn engine(&self, config: MixConfig, encoder: Arc<dyn AudioEncoder>) -> MixEngine {
        let analyzer = Arc::new(StructuralAnalyzer::new(config.analysis.clone(), Arc::new(HintsOnly)));
        MixEngine::with_analyzer(config, analyzer, encoder)
    }

    fn request(&self) -> MixRequest {
        fixture_request(self.dir.path())
    }

    fn workspace_entries(&self) -> usize {
        std::fs::read_dir(&self.work).map(|d| d.count()).unwrap_or(0)
    }
}

#[tokio::test]
async fn test_session_success_cleans_up() {
    let fx = SessionFixture::new();
    let encoder = FakeEncoder::new(|_| false);
    let engine = fx.engine(fx.config(), encoder.clone());
    let (tracker, status) = ProgressTracker::new(Uuid::new_v4());

    let output = engine
        .run(fx.request(), fx.destination.clone(), &tracker, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.transition_count, 2);
    assert_eq!(output.path, fx.destination);
    assert_eq!(std::fs::read(&fx.destination).unwrap(), b"audio");
    assert_eq!(fx.workspace_entries(), 0);

    let jobs = encoder.jobs();
    assert_eq!(
        jobs,
        vec![
            JobKind::Transition { step: 0, attempt: 0 },
            JobKind::Transition { step: 1, attempt: 0 },
            JobKind::Master,
        ]
    );
    // A consumed intermediate is deleted before the next job starts
    assert!(*encoder.max_workspace_files.lock() <= 1);

    let status = status.borrow().clone();
    assert_eq!(status.state, SessionState::Complete);
    assert_eq!(status.progress_percent, 100.0);
    assert!(status.output.is_some());
}

#[tokio::test]
async fn test_session_retries_failed_step_with_simplified_plan() {
    let fx = SessionFixture::new();
    let encoder = FakeEncoder::new(|kind| matches!(kind, JobKind::Transition { step: 1, attempt: 0 }));
    let engine = fx.engine(fx.config(), encoder.clone());
    let (tracker, _status) = ProgressTracker::new(Uuid::new_v4());

    let output = engine
        .run(fx.request(), fx.destination.clone(), &tracker, CancellationToken::new())
        .await
        .unwrap();

    let retried = &output.transitions[1];
    assert_eq!(retried.style, TransitionStyle::LinearBlend);
    assert_eq!(retried.tempo_stretch, None);
    assert!(retried.rationale.notes.iter().any(|n| n.contains("simplified")));
    assert!(encoder.jobs().contains(&JobKind::Transition { step: 1, attempt: 1 }));
    assert!(fx.destination.exists());
    assert_eq!(fx.workspace_entries(), 0);
}

#[tokio::test]
async fn test_session_fails_after_second_failure() {
    let fx = SessionFixture::new();
    let encoder = FakeEncoder::new(|kind| matches!(kind, JobKind::Transition { step: 0, .. }));
    let engine = fx.engine(fx.config(), encoder.clone());
    let (tracker, status) = ProgressTracker::new(Uuid::new_v4());

    let err = engine
        .run(fx.request(), fx.destination.clone(), &tracker, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MixError::RenderStep { step: 0, .. }));
    assert!(!fx.destination.exists());
    assert_eq!(fx.workspace_entries(), 0);
    assert!(!encoder.jobs().contains(&JobKind::Master));

    let status = status.borrow().clone();
    assert_eq!(status.state, SessionState::Failed);
    assert!(status.error.unwrap().contains("simplified retry"));
}

#[tokio::test]
async fn test_session_cancellation_through_manager() {
    let fx = SessionFixture::new();
    let manager = SessionManager::new(fx.engine(fx.config(), Arc::new(StallingEncoder)));
    let id = manager.submit(fx.request(), fx.destination.clone());

    // Wait until the first step is running
    for _ in 0..2000 {
        if manager.status(id).unwrap().current_transition.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.status(id).unwrap().state, SessionState::Rendering);

    manager.cancel(id).unwrap();
    let status = manager.wait(id).await.unwrap();
    assert_eq!(status.state, SessionState::Failed);
    assert!(status.error.unwrap().contains("cancelled"));

    let result = manager.take_result(id).await;
    assert!(matches!(result, Err(MixError::Cancelled)));
    assert!(manager.status(id).is_err());
    assert!(!fx.destination.exists());
    assert_eq!(fx.workspace_entries(), 0);
}

#[tokio::test]
async fn test_session_time_budget() {
    let fx = SessionFixture::new();
    let mut config = fx.config();
    config.session.base_timeout_seconds = 1;
    config.session.per_track_timeout_seconds = 0;
    let engine = fx.engine(config, Arc::new(StallingEncoder));
    let (tracker, _status) = ProgressTracker::new(Uuid::new_v4());

    let err = engine
        .run(fx.request(), fx.destination.clone(), &tracker, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MixError::SessionTimeout(_)));
    assert!(!fx.destination.exists());
    assert_eq!(fx.workspace_entries(), 0);
}

#[tokio::test]
async fn test_manager_runs_concurrent_sessions_and_reaps() {
    let fx = SessionFixture::new();
    let mut config = fx.config();
    config.session.max_concurrent_sessions = Some(2);
    config.session.retention_seconds = 0;
    let manager = SessionManager::new(fx.engine(config, FakeEncoder::new(|_| false)));

    let request = fx.request();
    let ids: Vec<Uuid> = (0..3)
        .map(|i| manager.submit(request.clone(), fx.dir.path().join(format!("mix-{}.mp3", i))))
        .collect();

    for id in &ids {
        let status = manager.wait(*id).await.unwrap();
        assert_eq!(status.state, SessionState::Complete, "{:?}", status.error);
    }
    assert_eq!(manager.len(), 3);
    assert_eq!(manager.reap_expired(), 3);
    assert!(manager.is_empty());
    for i in 0..3 {
        assert!(fx.dir.path().join(format!("mix-{}.mp3", i)).exists());
    }
    assert_eq!(fx.workspace_entries(), 0);
}

#[tokio::test]
async fn test_unknown_session_is_reported() {
    let fx = SessionFixture::new();
    let manager = SessionManager::new(fx.engine(fx.config(), FakeEncoder::new(|_| false)));
    let missing = Uuid::new_v4();
    assert!(matches!(manager.status(missing), Err(MixError::SessionNotFound(_))));
    assert!(matches!(manager.cancel(missing), Err(MixError::SessionNotFound(_))));
}

#[tokio::test]
async fn test_unreadable_track_fails_explicit_request() {
    let fx = SessionFixture::new();
    let engine = fx.engine(fx.config(), FakeEncoder::new(|_| false));
    let mut request = fx.request();
    request.tracks.push(TrackInput::from_path(fx.dir.path().join("missing.wav")));

    let err = engine.prepare(&request).await.unwrap_err();
    assert!(err.is_recoverable());

    request.skip_unreadable = true;
    let prepared = engine.prepare(&request).await.unwrap();
    assert_eq!(prepared.plan.entries.len(), 3);
}

// =============================================================================
// Pipeline
// =============================================================================

#[test]
fn test_dry_run_plans_without_rendering() {
    let dir = TempDir::new().unwrap();
    let request = fixture_request(dir.path());
    let request_path = dir.path().join("set.json");
    std::fs::write(&request_path, serde_json::to_string(&request).unwrap()).unwrap();

    let settings = Settings {
        input: request_path,
        output: dir.path().join("mix.mp3"),
        order: true,
        dry_run: true,
        show_progress: false,
        ..Settings::default()
    };
    let result = djmix::pipeline::run(&settings).unwrap();

    assert_eq!(result.track_count, 3);
    assert_eq!(result.transition_count, 2);
    assert!(result.output.is_none());
    assert!(result.total_duration_seconds > TRACK_SECONDS);
    assert!(!dir.path().join("mix.mp3").exists());
    assert!(!dir.path().join("mix.json").exists());
}

/// Full render through a real ffmpeg binary
#[tokio::test]
#[ignore = "requires ffmpeg on PATH"]
async fn test_real_ffmpeg_render() {
    let fx = SessionFixture::new();
    let encoder = FfmpegEncoder::new("ffmpeg");
    encoder.check_available().await.unwrap();
    let engine = fx.engine(fx.config(), Arc::new(encoder));
    let (tracker, _status) = ProgressTracker::new(Uuid::new_v4());

    let output = engine
        .run(fx.request(), fx.destination.clone(), &tracker, CancellationToken::new())
        .await
        .unwrap();

    let size = std::fs::metadata(&output.path).unwrap().len();
    assert!(size > 100_000, "master is only {} bytes", size);
    assert_eq!(fx.workspace_entries(), 0);
}
