#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure scoring rules mapping outcomes to point deltas.

use std::time::Duration;

use gabor_hunt_core::{DifficultyState, SessionConfig};

/// Points awarded for selecting a target `elapsed` after it spawned.
///
/// Decays from `max_perfect_score` at spawn towards a floor of one point as
/// `elapsed` approaches `duration`, following `(1 - elapsed / duration)^exponent`.
#[must_use]
pub fn hit_score(
    elapsed: Duration,
    duration: Duration,
    max_perfect_score: u32,
    exponent: f64,
) -> u32 {
    let remaining = if duration.is_zero() {
        0.0
    } else {
        1.0 - (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    };
    let exponent = if exponent.is_finite() {
        exponent.max(0.0)
    } else {
        1.0
    };
    let points = (f64::from(max_perfect_score) * remaining.powf(exponent)).round();
    (points as u32).max(1)
}

/// Penalty for a miss that follows `consecutive_misses` earlier misses.
#[must_use]
pub const fn miss_penalty(base_penalty: u32, consecutive_misses: u32, per_miss_increment: u32) -> u32 {
    base_penalty.saturating_add(consecutive_misses.saturating_mul(per_miss_increment))
}

/// Deducts `penalty` from `score`, never going below zero.
#[must_use]
pub const fn apply_penalty(score: u64, penalty: u32) -> u64 {
    score.saturating_sub(penalty as u64)
}

/// Applies hit and miss outcomes to the session's difficulty state.
#[derive(Clone, Copy, Debug)]
pub struct ScoringEngine {
    base_penalty: u32,
    per_miss_increment: u32,
}

impl ScoringEngine {
    /// Creates an engine using the provided penalty parameters.
    #[must_use]
    pub const fn new(base_penalty: u32, per_miss_increment: u32) -> Self {
        Self {
            base_penalty,
            per_miss_increment,
        }
    }

    /// Creates an engine from session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.base_penalty, config.per_miss_increment)
    }

    /// Credits a hit worth `points` and resets the miss streak.
    pub fn record_hit(&self, state: &mut DifficultyState, points: u32) {
        state.score = state.score.saturating_add(u64::from(points));
        state.hits = state.hits.saturating_add(1);
        state.hit_points = state.hit_points.saturating_add(u64::from(points));
        state.consecutive_misses = 0;
    }

    /// Applies the escalating miss penalty and returns the deducted amount.
    pub fn record_miss(&self, state: &mut DifficultyState) -> u32 {
        let penalty = miss_penalty(
            self.base_penalty,
            state.consecutive_misses,
            self.per_miss_increment,
        );
        state.score = apply_penalty(state.score, penalty);
        state.consecutive_misses = state.consecutive_misses.saturating_add(1);
        penalty
    }
}
