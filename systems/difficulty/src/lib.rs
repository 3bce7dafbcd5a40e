#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adaptive difficulty derived from cumulative session performance.
//!
//! The controller is recomputed after every hit or miss. Drift and fader
//! probabilities are pure functions of the cumulative score, while level
//! promotion is a one-way escalation triggered by a high mean score per hit.

use gabor_hunt_core::{DifficultyState, Event, Level, SessionConfig};
use tracing::{debug, info};

/// Score span that unlocks one further drift or fader increment.
pub const SCORE_STEP: u64 = 500;
/// Fader probability right after activation.
pub const FADER_BASE_FRACTION: f64 = 0.15;
/// Fader probability added for every further [`SCORE_STEP`] points.
pub const FADER_FRACTION_STEP: f64 = 0.15;
/// Ceiling on the fader probability.
pub const FADER_MAX_FRACTION: f64 = 0.95;
/// Mean points per hit that triggers promotion to level two.
pub const PROMOTION_AVERAGE_POINTS: f64 = 25.0;
/// Factor applied to both fade bounds on promotion.
pub const PROMOTION_FADE_FACTOR: f64 = 1.25;
/// Amount added to the scoring exponent on promotion.
pub const PROMOTION_EXPONENT_BONUS: f64 = 1.0;
/// Factor applied to the stimulus contrast on promotion (capped at 1.0).
pub const PROMOTION_CONTRAST_FACTOR: f64 = 1.05;

const FRACTION_EPSILON: f64 = 1e-12;

/// Pure system that recomputes [`DifficultyState`] after each outcome.
#[derive(Clone, Copy, Debug)]
pub struct DifficultyController {
    drift_base_fraction: f64,
    drift_increment_per_step: f64,
    drift_max_fraction: f64,
    fader_activation_score: u64,
}

impl DifficultyController {
    /// Creates a controller from session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            drift_base_fraction: config.drift_base_fraction,
            drift_increment_per_step: config.drift_increment_per_500,
            drift_max_fraction: config.drift_max_fraction,
            fader_activation_score: config.fader_activation_score,
        }
    }

    /// Probability that a new target drifts at the provided cumulative score.
    #[must_use]
    pub fn drift_fraction(&self, score: u64) -> f64 {
        let steps = (score / SCORE_STEP) as f64;
        (self.drift_base_fraction + steps * self.drift_increment_per_step)
            .min(self.drift_max_fraction)
            .clamp(0.0, 1.0)
    }

    /// Probability that a new target is a fader at the provided cumulative score.
    #[must_use]
    pub fn fader_fraction(&self, score: u64) -> f64 {
        if score < self.fader_activation_score {
            return 0.0;
        }
        let steps = ((score - self.fader_activation_score) / SCORE_STEP) as f64;
        (FADER_BASE_FRACTION + steps * FADER_FRACTION_STEP).min(FADER_MAX_FRACTION)
    }

    /// Recomputes derived parameters and reports every change through `out`.
    pub fn recompute(&self, state: &mut DifficultyState, out: &mut Vec<Event>) {
        let drift = self.drift_fraction(state.score);
        if (drift - state.drift_fraction).abs() > FRACTION_EPSILON {
            debug!(from = state.drift_fraction, to = drift, "drift fraction changed");
            state.drift_fraction = drift;
            out.push(Event::DriftFractionChanged { fraction: drift });
        }

        let fader = self.fader_fraction(state.score);
        let was_inactive = state.fader_fraction <= 0.0;
        state.fader_fraction = fader;
        if was_inactive && fader > 0.0 {
            info!(score = state.score, fraction = fader, "fader targets activated");
            out.push(Event::FaderActivated);
        }

        if self.try_promote(state) {
            out.push(Event::LevelUp { level: state.level });
        }
    }

    fn try_promote(&self, state: &mut DifficultyState) -> bool {
        if state.level != Level::ONE {
            return false;
        }
        let Some(average) = state.average_hit_points() else {
            return false;
        };
        if average < PROMOTION_AVERAGE_POINTS {
            return false;
        }

        state.level = Level::TWO;
        state.fade_bounds = state.fade_bounds.scaled(PROMOTION_FADE_FACTOR);
        state.scoring_exponent += PROMOTION_EXPONENT_BONUS;
        state.contrast = (state.contrast * PROMOTION_CONTRAST_FACTOR).min(1.0);
        info!(
            average,
            exponent = state.scoring_exponent,
            contrast = state.contrast,
            "promoted to level two"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gabor_hunt_core::FadeBounds;
    use std::time::Duration;

    fn controller() -> DifficultyController {
        DifficultyController::from_config(&SessionConfig {
            drift_base_fraction: 0.10,
            drift_increment_per_500: 0.10,
            drift_max_fraction: 0.60,
            fader_activation_score: 1_500,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn drift_fraction_matches_worked_example() {
        assert!((controller().drift_fraction(1_200) - 0.30).abs() < 1e-9);
    }

    #[test]
    fn drift_fraction_is_monotonic_and_capped() {
        let controller = controller();
        let mut previous = 0.0;
        for score in (0..20_000).step_by(37) {
            let fraction = controller.drift_fraction(score);
            assert!(fraction >= previous);
            assert!(fraction <= 0.60 + 1e-12);
            previous = fraction;
        }
        assert!((controller.drift_fraction(u64::MAX) - 0.60).abs() < 1e-9);
    }

    #[test]
    fn fader_fraction_waits_for_activation_threshold() {
        let controller = controller();
        assert_eq!(controller.fader_fraction(1_499), 0.0);
        assert!((controller.fader_fraction(1_500) - 0.15).abs() < 1e-9);
        assert!((controller.fader_fraction(2_600) - 0.45).abs() < 1e-9);
        assert!((controller.fader_fraction(100_000) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn high_average_promotes_exactly_once() {
        let config = SessionConfig {
            contrast: 0.98,
            ..SessionConfig::default()
        };
        let controller = DifficultyController::from_config(&config);
        let mut state = DifficultyState::initial(&config);
        state.hits = 10;
        state.hit_points = 260;
        state.score = 260;
        state.fade_bounds = FadeBounds::from_secs(2.0, 4.0);
        let exponent = state.scoring_exponent;

        let mut events = Vec::new();
        controller.recompute(&mut state, &mut events);

        assert!(events.contains(&Event::LevelUp { level: Level::TWO }));
        assert_eq!(state.level, Level::TWO);
        assert_eq!(state.fade_bounds.min, Duration::from_millis(2_500));
        assert_eq!(state.fade_bounds.max, Duration::from_millis(5_000));
        assert!((state.scoring_exponent - (exponent + 1.0)).abs() < 1e-9);
        assert_eq!(state.contrast, 1.0);

        events.clear();
        state.hit_points = 1_000;
        controller.recompute(&mut state, &mut events);
        assert!(!events.iter().any(|event| matches!(event, Event::LevelUp { .. })));
        assert_eq!(state.fade_bounds.max, Duration::from_millis(5_000));
    }

    #[test]
    fn low_average_never_promotes() {
        let config = SessionConfig::default();
        let controller = DifficultyController::from_config(&config);
        let mut state = DifficultyState::initial(&config);
        state.hits = 10;
        state.hit_points = 249;

        let mut events = Vec::new();
        controller.recompute(&mut state, &mut events);

        assert_eq!(state.level, Level::ONE);
        assert!(events.is_empty());
    }

    #[test]
    fn crossing_thresholds_emits_change_notifications() {
        let config = SessionConfig::default();
        let controller = DifficultyController::from_config(&config);
        let mut state = DifficultyState::initial(&config);
        state.score = 1_600;

        let mut events = Vec::new();
        controller.recompute(&mut state, &mut events);

        assert_eq!(
            events,
            vec![
                Event::DriftFractionChanged {
                    fraction: controller.drift_fraction(1_600),
                },
                Event::FaderActivated,
            ],
        );

        events.clear();
        controller.recompute(&mut state, &mut events);
        assert!(events.is_empty(), "unchanged state must stay silent");
    }
}
