//! Harmonic ordering of a track set
//!
//! Tracks are nodes of a complete directed graph; a set order is a path and
//! its score is the sum of the pair scores along it. The search is
//! nearest-neighbour from every start node followed by 2-opt, with the input
//! order and its reverse as a floor, so the result never scores below either.

use crate::config::OrderingConfig;
use crate::ordering::compatibility::{pair_compatibility, PairCompatibility};
use crate::ordering::energy_curve::{transition_position, EnergyCurve};
use crate::types::TrackProfile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Scores equal within this margin count as ties
const TIE_EPSILON: f64 = 1e-9;

/// Chosen permutation and its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Indices into the input slice, in play order
    pub permutation: Vec<usize>,
    /// Sum of pair scores along the path
    pub total_score: f64,
    /// Per-transition score breakdown
    pub pairs: Vec<PairCompatibility>,
}

/// Orders a set of profiles for maximal pairwise compatibility
pub struct HarmonicOrderer {
    config: OrderingConfig,
}

impl HarmonicOrderer {
    pub fn new(config: OrderingConfig) -> Self {
        Self { config }
    }

    /// Order `profiles`. `seed` only randomizes exact ties; without it the
    /// lower input index wins every tie.
    pub fn order(
        &self,
        profiles: &[Arc<TrackProfile>],
        curve: Option<EnergyCurve>,
        seed: Option<u64>,
    ) -> OrderResult {
        let n = profiles.len();
        if n < 2 {
            let permutation: Vec<usize> = (0..n).collect();
            return self.result_for(profiles, permutation, curve);
        }

        let scorer = PathScorer::new(profiles, &self.config, curve);
        let mut rng = seed.map(StdRng::seed_from_u64);

        let mut best: Vec<usize> = (0..n).collect();
        let mut best_score = scorer.path_score(&best);

        let reversed: Vec<usize> = (0..n).rev().collect();
        let reversed_score = scorer.path_score(&reversed);
        if reversed_score > best_score + TIE_EPSILON {
            best = reversed;
            best_score = reversed_score;
        }

        for start in 0..n {
            let mut path = scorer.nearest_neighbour(start, rng.as_mut());
            let mut score = scorer.path_score(&path);
            score = scorer.two_opt(&mut path, score, self.config.max_two_opt_passes);
            if score > best_score + TIE_EPSILON {
                best = path;
                best_score = score;
            }
        }

        debug!(
            "Ordered {} tracks, score {:.2} (input order {:.2})",
            n,
            best_score,
            scorer.path_score(&(0..n).collect::<Vec<_>>())
        );

        self.result_for(profiles, best, curve)
    }

    /// Score of an explicit order (used for the input order and in reports)
    pub fn path_score(
        &self,
        profiles: &[Arc<TrackProfile>],
        order: &[usize],
        curve: Option<EnergyCurve>,
    ) -> f64 {
        PathScorer::new(profiles, &self.config, curve).path_score(order)
    }

    fn result_for(
        &self,
        profiles: &[Arc<TrackProfile>],
        permutation: Vec<usize>,
        curve: Option<EnergyCurve>,
    ) -> OrderResult {
        let scorer = PathScorer::new(profiles, &self.config, curve);
        let pairs: Vec<PairCompatibility> = permutation
            .windows(2)
            .enumerate()
            .map(|(k, w)| scorer.pair(w[0], w[1], k))
            .collect();
        OrderResult {
            total_score: pairs.iter().map(|p| p.total).sum(),
            permutation,
            pairs,
        }
    }
}

/// Scores paths over a fixed profile set
struct PathScorer<'a> {
    profiles: &'a [Arc<TrackProfile>],
    config: &'a OrderingConfig,
    curve: Option<EnergyCurve>,
    energy_low: f64,
    energy_high: f64,
}

impl<'a> PathScorer<'a> {
    fn new(
        profiles: &'a [Arc<TrackProfile>],
        config: &'a OrderingConfig,
        curve: Option<EnergyCurve>,
    ) -> Self {
        let energy_low = profiles.iter().map(|p| p.energy).fold(f64::MAX, f64::min);
        let energy_high = profiles.iter().map(|p| p.energy).fold(f64::MIN, f64::max);
        Self {
            profiles,
            config,
            curve,
            energy_low: if profiles.is_empty() { 0.0 } else { energy_low },
            energy_high: if profiles.is_empty() { 1.0 } else { energy_high },
        }
    }

    fn transitions(&self) -> usize {
        self.profiles.len().saturating_sub(1)
    }

    /// Pair score for `from -> to` as transition number `position`
    fn pair(&self, from: usize, to: usize, position: usize) -> PairCompatibility {
        let target = self.curve.map(|c| {
            c.target(
                transition_position(position, self.transitions()),
                self.energy_low,
                self.energy_high,
            )
        });
        pair_compatibility(&self.profiles[from], &self.profiles[to], self.config, target)
    }

    fn path_score(&self, path: &[usize]) -> f64 {
        path.windows(2)
            .enumerate()
            .map(|(k, w)| self.pair(w[0], w[1], k).total)
            .sum()
    }

    /// Greedy path from `start`; ties go to the lowest index unless an rng
    /// is supplied
    fn nearest_neighbour(&self, start: usize, mut rng: Option<&mut StdRng>) -> Vec<usize> {
        let n = self.profiles.len();
        let mut visited = vec![false; n];
        let mut path = Vec::with_capacity(n);
        visited[start] = true;
        path.push(start);

        while path.len() < n {
            let current = path[path.len() - 1];
            let position = path.len() - 1;
            let mut best_score = f64::MIN;
            let mut candidates: Vec<usize> = Vec::new();
            for next in (0..n).filter(|&i| !visited[i]) {
                let score = self.pair(current, next, position).total;
                if score > best_score + TIE_EPSILON {
                    best_score = score;
                    candidates.clear();
                    candidates.push(next);
                } else if (score - best_score).abs() <= TIE_EPSILON {
                    candidates.push(next);
                }
            }
            let chosen = match rng.as_deref_mut() {
                Some(rng) if candidates.len() > 1 => candidates[rng.random_range(0..candidates.len())],
                _ => candidates[0],
            };
            visited[chosen] = true;
            path.push(chosen);
        }
        path
    }

    /// 2-opt: reverse sub-paths while that strictly improves the full score
    ///
    /// Pair scores are directional and the energy term depends on position,
    /// so every candidate is re-scored end to end.
    fn two_opt(&self, path: &mut [usize], mut score: f64, max_passes: usize) -> f64 {
        let n = path.len();
        for _ in 0..max_passes {
            let mut improved = false;
            for i in 0..n.saturating_sub(1) {
                for j in (i + 1)..n {
                    path[i..=j].reverse();
                    let candidate = self.path_score(path);
                    if candidate > score + TIE_EPSILON {
                        score = candidate;
                        improved = true;
                    } else {
                        path[i..=j].reverse();
                    }
                }
            }
            if !improved {
                break;
            }
        }
        score
    }
}
