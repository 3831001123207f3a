//! Shared profile cache
//!
//! Profiles are immutable once computed and handed out as `Arc`s, so any
//! number of concurrent sessions can read them. The key combines the file
//! identity (path, size, mtime) with the request hints, since a tagged tempo
//! or key changes the resulting profile.
//!
//! The cache holds at most `capacity` profiles; past that the oldest insert
//! is evicted. Sessions already holding an evicted `Arc` keep using it.

use crate::analysis::structure::StructuralAnalyzer;
use crate::discovery::file_identity;
use crate::error::{MixError, Result};
use crate::types::{TrackInput, TrackProfile};
use hash32::FnvHasher;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;
use std::sync::Arc;
use tracing::{debug, info};

/// Profiles kept when no capacity is configured
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Default)]
struct Entries {
    profiles: HashMap<u64, Arc<TrackProfile>>,
    /// Keys in insertion order, oldest first
    order: VecDeque<u64>,
}

impl Entries {
    fn get_or_insert(&mut self, key: u64, profile: Arc<TrackProfile>, capacity: usize) -> Arc<TrackProfile> {
        if let Some(existing) = self.profiles.get(&key) {
            return Arc::clone(existing);
        }
        self.store(key, Arc::clone(&profile), capacity);
        profile
    }

    fn store(&mut self, key: u64, profile: Arc<TrackProfile>, capacity: usize) {
        if self.profiles.insert(key, profile).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.profiles.remove(&oldest);
                debug!("Evicted cached profile {:016x}", oldest);
            }
        }
    }
}

/// Bounded cache of analyzed tracks keyed by file identity and request hints
pub struct ProfileCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` profiles (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().profiles.is_empty()
    }

    /// Return the cached profile for `input`, analyzing it on a miss
    pub fn get_or_analyze(
        &self,
        analyzer: &StructuralAnalyzer,
        input: &TrackInput,
    ) -> Result<Arc<TrackProfile>> {
        let key = cache_key(input)?;
        if let Some(profile) = self.entries.read().profiles.get(&key) {
            debug!("Profile cache hit: {}", input.source.display());
            return Ok(Arc::clone(profile));
        }

        let profile = Arc::new(analyzer.analyze(input)?);
        // Two racing misses analyze twice; the first insert wins
        Ok(self.entries.write().get_or_insert(key, profile, self.capacity))
    }

    /// Resolve many inputs in parallel on the rayon pool, preserving order
    pub fn resolve_all(
        &self,
        analyzer: &StructuralAnalyzer,
        inputs: &[TrackInput],
    ) -> Vec<Result<Arc<TrackProfile>>> {
        let results: Vec<_> = inputs
            .par_iter()
            .map(|input| self.get_or_analyze(analyzer, input))
            .collect();
        info!(
            "Resolved {} of {} track profiles",
            results.iter().filter(|r| r.is_ok()).count(),
            inputs.len()
        );
        results
    }

    /// Async wrapper: runs [`resolve_all`](Self::resolve_all) off the async
    /// worker threads so decode work never stalls the runtime
    pub async fn resolve_all_blocking(
        self: Arc<Self>,
        analyzer: Arc<StructuralAnalyzer>,
        inputs: Vec<TrackInput>,
    ) -> Result<Vec<Result<Arc<TrackProfile>>>> {
        tokio::task::spawn_blocking(move || self.resolve_all(&analyzer, &inputs))
            .await
            .map_err(|e| MixError::Io(std::io::Error::other(e)))
    }

    /// Insert an externally built profile (precomputed inputs, tests)
    pub fn insert(&self, input: &TrackInput, profile: TrackProfile) -> Result<Arc<TrackProfile>> {
        let key = cache_key(input)?;
        let profile = Arc::new(profile);
        self.entries.write().store(key, Arc::clone(&profile), self.capacity);
        Ok(profile)
    }
}

fn cache_key(input: &TrackInput) -> Result<u64> {
    use hash32::Hasher as Hash32Hasher;

    let identity = file_identity(&input.source)?;
    let hints = serde_json::to_vec(input).map_err(|e| {
        MixError::InvalidRequest(format!("cannot hash request entry: {}", e))
    })?;

    let mut hasher = FnvHasher::default();
    hasher.write(&hints);
    Ok(identity ^ ((hasher.finish32() as u64) << 16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::traits::{TempoKeyEstimate, TempoKeyEstimator};
    use crate::config::AnalysisConfig;
    use crate::types::AudioBuffer;

    struct NoEstimate;

    impl TempoKeyEstimator for NoEstimate {
        fn estimate(&self, _buffer: &AudioBuffer) -> Result<TempoKeyEstimate> {
            Ok(TempoKeyEstimate::empty())
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    fn write_wav(path: &std::path::Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(22050 * seconds) {
            let v = ((i % 5512) as f32 / 5512.0 * 2000.0) as i16;
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 5);

        let analyzer = StructuralAnalyzer::new(AnalysisConfig::default(), Arc::new(NoEstimate));
        let cache = ProfileCache::new();
        let input = TrackInput::from_path(&path);

        let first = cache.get_or_analyze(&analyzer, &input).unwrap();
        let second = cache.get_or_analyze(&analyzer, &input).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hints_change_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 5);

        let plain = TrackInput::from_path(&path);
        let mut hinted = TrackInput::from_path(&path);
        hinted.key = Some("8A".to_string());
        assert_ne!(cache_key(&plain).unwrap(), cache_key(&hinted).unwrap());
    }

    #[test]
    fn test_missing_file_is_recoverable() {
        let analyzer = StructuralAnalyzer::new(AnalysisConfig::default(), Arc::new(NoEstimate));
        let cache = ProfileCache::new();
        let results = cache.resolve_all(&analyzer, &[TrackInput::from_path("/no/such.wav")]);
        assert!(results[0].as_ref().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_oldest_profile_is_evicted_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{}.wav", i));
                write_wav(&path, 5);
                path
            })
            .collect();

        let analyzer = StructuralAnalyzer::new(AnalysisConfig::default(), Arc::new(NoEstimate));
        let cache = ProfileCache::with_capacity(2);
        let first = cache.get_or_analyze(&analyzer, &TrackInput::from_path(&paths[0])).unwrap();
        let second = cache.get_or_analyze(&analyzer, &TrackInput::from_path(&paths[1])).unwrap();
        cache.get_or_analyze(&analyzer, &TrackInput::from_path(&paths[2])).unwrap();
        assert_eq!(cache.len(), 2);

        // The second track survived; the first was re-analyzed
        let again = cache.get_or_analyze(&analyzer, &TrackInput::from_path(&paths[1])).unwrap();
        assert!(Arc::ptr_eq(&second, &again));
        let again = cache.get_or_analyze(&analyzer, &TrackInput::from_path(&paths[0])).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let cache = ProfileCache::with_capacity(0);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_empty());
    }

    struct Panicking;

    impl TempoKeyEstimator for Panicking {
        fn estimate(&self, _buffer: &AudioBuffer) -> Result<TempoKeyEstimate> {
            panic!("estimator crashed")
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicked_analysis_task_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 5);

        let analyzer = Arc::new(StructuralAnalyzer::new(AnalysisConfig::default(), Arc::new(Panicking)));
        let cache = Arc::new(ProfileCache::new());
        let err = cache
            .resolve_all_blocking(analyzer, vec![TrackInput::from_path(&path)])
            .await
            .unwrap_err();
        assert!(matches!(err, MixError::Io(_)));
    }
}
