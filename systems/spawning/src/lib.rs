#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for emitting target spawn commands.
//!
//! The scheduler accumulates session time from [`Event::TimeAdvanced`] and
//! makes one spawn attempt per elapsed interval. Each admitted attempt is
//! planned in full (stimulus pixels, fade curve, lifetime, drift, placement)
//! and submitted as a [`Command::SpawnTarget`]. Every random decision draws
//! from its own seeded stream, so a given seed and tick sequence always
//! produces the same plans.

use std::{f64::consts::TAU, time::Duration};

use gabor_hunt_core::{
    Command, ConfigurationError, DifficultyState, Event, ModeOverrides, ScoringSnapshot,
    SessionConfig, SessionState, SpawnSkipReason, StimulusParameters, TargetPlan,
};
use gabor_hunt_system_lifecycle::{sample_drift, sample_fade, sample_position, FadeInputs};
use gabor_hunt_system_stimulus::render;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Widest orientation jitter honoured, in degrees either side of the base.
pub const MAX_ORIENTATION_JITTER_DEG: f64 = 180.0;

const RNG_STREAM_STIMULUS: &str = "stimulus";
const RNG_STREAM_FADE: &str = "fade";
const RNG_STREAM_DRIFT: &str = "drift";
const RNG_STREAM_PLACEMENT: &str = "placement";

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    spawn_interval: Duration,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided spawn cadence and seed.
    #[must_use]
    pub const fn new(spawn_interval: Duration, rng_seed: u64) -> Self {
        Self {
            spawn_interval,
            rng_seed,
        }
    }

    /// Derives the cadence and seed from session configuration.
    #[must_use]
    pub fn from_session(config: &SessionConfig) -> Self {
        Self::new(config.spawn_interval(), config.seed)
    }
}

/// Immutable session views consulted when planning spawns.
#[derive(Clone, Copy, Debug)]
pub struct SpawnInputs<'a> {
    /// Whether the session clock is advancing.
    pub state: SessionState,
    /// Number of targets currently live in the session.
    pub active_targets: usize,
    /// Configuration the session runs with.
    pub config: &'a SessionConfig,
    /// Adaptive difficulty state driving new plans.
    pub difficulty: &'a DifficultyState,
    /// Override table of the active mode, if any.
    pub overrides: Option<&'a ModeOverrides>,
}

/// Pure system that deterministically emits spawn commands while the session runs.
#[derive(Debug)]
pub struct SpawnScheduler {
    spawn_interval: Duration,
    accumulator: Duration,
    stimulus_rng: ChaCha8Rng,
    fade_rng: ChaCha8Rng,
    drift_rng: ChaCha8Rng,
    placement_rng: ChaCha8Rng,
}

impl SpawnScheduler {
    /// Creates a new scheduler using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let stream =
            |label: &str| ChaCha8Rng::seed_from_u64(derive_labeled_seed(config.rng_seed, label));
        Self {
            spawn_interval: config.spawn_interval,
            accumulator: Duration::ZERO,
            stimulus_rng: stream(RNG_STREAM_STIMULUS),
            fade_rng: stream(RNG_STREAM_FADE),
            drift_rng: stream(RNG_STREAM_DRIFT),
            placement_rng: stream(RNG_STREAM_PLACEMENT),
        }
    }

    /// Time accumulated towards the next spawn attempt.
    #[must_use]
    pub const fn accumulated(&self) -> Duration {
        self.accumulator
    }

    /// Consumes events and immutable views to emit spawn commands.
    ///
    /// Attempts that find the session at capacity are dropped rather than
    /// retried. Attempts that cannot be planned are logged and skipped; the
    /// scheduler keeps running. Every dropped attempt is reported through
    /// [`Command::SkipSpawn`].
    pub fn handle(&mut self, events: &[Event], inputs: SpawnInputs<'_>, out: &mut Vec<Command>) {
        if inputs.state != SessionState::Running {
            self.accumulator = Duration::ZERO;
            return;
        }

        let accumulated = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);

        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        let attempts = self.resolve_spawn_attempts();

        let mut occupied = inputs.active_targets;
        for _ in 0..attempts {
            if occupied >= inputs.config.max_concurrent {
                debug!(active = occupied, "spawn attempt skipped at capacity");
                out.push(Command::SkipSpawn {
                    reason: SpawnSkipReason::AtCapacity,
                });
                continue;
            }

            match self.plan_target(&inputs) {
                Ok(plan) => {
                    occupied += 1;
                    out.push(Command::SpawnTarget {
                        plan: Box::new(plan),
                    });
                }
                Err(error) => {
                    warn!(%error, "spawn attempt skipped: target could not be planned");
                    out.push(Command::SkipSpawn {
                        reason: SpawnSkipReason::Misconfigured,
                    });
                }
            }
        }
    }

    /// Plans a single target from the current configuration and difficulty.
    pub fn plan_target(
        &mut self,
        inputs: &SpawnInputs<'_>,
    ) -> Result<TargetPlan, ConfigurationError> {
        let config = inputs.config;
        let difficulty = inputs.difficulty;
        let size = config.stimulus_size();
        let bounds = config.arena().placement_bounds(size)?;

        let jitter = if config.orientation_jitter_deg.is_finite() {
            config.orientation_jitter_deg.abs().min(MAX_ORIENTATION_JITTER_DEG)
        } else {
            0.0
        };
        let orientation =
            (config.orientation_deg + self.stimulus_rng.gen_range(-jitter..=jitter)).to_radians();
        let phase = if config.phase_randomized {
            self.stimulus_rng.gen_range(0.0..TAU)
        } else {
            0.0
        };

        let parameters = StimulusParameters {
            size,
            wavelength: config.wavelength,
            orientation,
            phase,
            sigma: config.sigma,
            contrast: difficulty.contrast,
            brightness: config.brightness,
            quantization_levels: config.quantization_levels,
            background: config.background_color,
        };
        let pixels = render(&parameters)?;

        let fader_probability = inputs
            .overrides
            .and_then(|overrides| overrides.fader_probability)
            .unwrap_or(difficulty.fader_fraction);
        let drift_probability = inputs
            .overrides
            .and_then(|overrides| overrides.drift_probability)
            .unwrap_or(difficulty.drift_fraction);

        let (fade, duration) = sample_fade(
            &mut self.fade_rng,
            &FadeInputs {
                bounds: difficulty.fade_bounds,
                fader_probability,
                fader_min_visibility: config.fader_min_visibility,
                fader_max_visibility: config.fader_max_visibility,
                max_perfect_score: config.max_perfect_score,
            },
        );
        let drift = sample_drift(&mut self.drift_rng, drift_probability, config.drift_speed_unit);
        let position = sample_position(&mut self.placement_rng, &bounds);

        Ok(TargetPlan {
            parameters,
            pixels,
            fade,
            duration,
            position,
            drift,
            scoring: ScoringSnapshot {
                max_perfect_score: config.max_perfect_score,
                exponent: difficulty.scoring_exponent,
            },
        })
    }

    fn resolve_spawn_attempts(&mut self) -> usize {
        if self.spawn_interval.is_zero() {
            return 0;
        }

        let mut attempts = 0;
        while self.accumulator >= self.spawn_interval {
            self.accumulator -= self.spawn_interval;
            attempts += 1;
        }
        attempts
    }
}

fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
