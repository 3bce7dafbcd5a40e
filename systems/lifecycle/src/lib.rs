#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-target timed state machine.
//!
//! A [`Target`] is a plain record owned by the session arena. Its timeline is
//! anchored at the session time it spawned at; every query derives progress
//! from `now - spawned_at`, so a delayed or skipped tick never desynchronizes
//! visibility or scoring. A target resolves exactly once, either as a hit
//! (selected in time) or as a miss (faded out, or selected too late).
//!
//! The sampling helpers decide a target's fade curve, lifetime, drift and
//! placement when it is planned.

use std::time::Duration;

use gabor_hunt_core::{
    FadeBounds, FadeKind, PixelBuffer, PlacementBounds, PlacementRect, Point, Resolution,
    ScoringSnapshot, StimulusParameters, TargetId, TargetPlan, TargetSnapshot, Velocity,
};
use gabor_hunt_system_scoring::hit_score;
use rand::Rng;
use rand_distr::{Distribution, UnitCircle};

/// Probability that a normal target receives a slow outlier lifetime.
pub const SLOW_OUTLIER_PROBABILITY: f64 = 0.12;
/// Extra lifetime of a slow outlier, as a fraction of the upper fade bound.
pub const SLOW_OUTLIER_SPAN: f64 = 0.8;
/// Lifetime multiplier applied to faders.
pub const FADER_DURATION_FACTOR: f64 = 1.4;
/// Exponent of the visibility ramp.
pub const VISIBILITY_EXPONENT: f64 = 0.9;
/// Slowest drift speed, in drift-speed units.
pub const DRIFT_SPEED_MIN_FACTOR: f64 = 0.5;
/// Fastest drift speed, in drift-speed units.
pub const DRIFT_SPEED_MAX_FACTOR: f64 = 2.1;
/// Largest drift speed unit honoured, in pixels per second.
pub const MAX_DRIFT_SPEED_UNIT: f64 = 10_000.0;

const MIN_PEAK_VISIBILITY: f64 = 0.01;

/// Outcome reported when a target resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The target was selected in time.
    Hit {
        /// Points awarded by the scoring engine.
        points: u32,
        /// Time from spawn to selection.
        elapsed: Duration,
    },
    /// The target faded out or was selected after it expired.
    Miss,
}

/// Inputs that decide a new target's fade curve and lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeInputs {
    /// Bounds of the normal lifetime.
    pub bounds: FadeBounds,
    /// Probability that the target is a fader.
    pub fader_probability: f64,
    /// Lower bound of a fader's peak visibility in points.
    pub fader_min_visibility: f64,
    /// Upper bound of a fader's peak visibility in points.
    pub fader_max_visibility: f64,
    /// Points awarded for an instantaneous selection.
    pub max_perfect_score: u32,
}

/// Draws the fade kind and lifetime of a new target.
pub fn sample_fade<R>(rng: &mut R, inputs: &FadeInputs) -> (FadeKind, Duration)
where
    R: Rng + ?Sized,
{
    let (min, max) = ordered(
        inputs.bounds.min.as_secs_f64(),
        inputs.bounds.max.as_secs_f64(),
    );

    if rng.gen_bool(probability(inputs.fader_probability)) {
        let lifetime = rng.gen_range(min..=max) * FADER_DURATION_FACTOR;
        let max_points = f64::from(inputs.max_perfect_score.max(1));
        let (low, high) = ordered(
            bounded(inputs.fader_min_visibility, 0.0, max_points),
            bounded(inputs.fader_max_visibility, 0.0, max_points),
        );
        let points = rng.gen_range(low..=high);
        let peak_visibility = (points / max_points).clamp(MIN_PEAK_VISIBILITY, 1.0);
        return (FadeKind::Fader { peak_visibility }, seconds(lifetime));
    }

    let lifetime = if rng.gen_bool(SLOW_OUTLIER_PROBABILITY) {
        max + rng.gen_range(0.0..=max * SLOW_OUTLIER_SPAN)
    } else {
        rng.gen_range(min..=max)
    };
    (FadeKind::Normal, seconds(lifetime))
}

/// Decides whether a new target drifts and, if so, its velocity.
///
/// `speed_unit` is the base drift speed in pixels per second, clamped to
/// `[0, MAX_DRIFT_SPEED_UNIT]`; the sampled speed lies within `[0.5, 2.1]`
/// units in a uniformly random direction.
pub fn sample_drift<R>(rng: &mut R, drift_probability: f64, speed_unit: f64) -> Option<Velocity>
where
    R: Rng + ?Sized,
{
    if !rng.gen_bool(probability(drift_probability)) {
        return None;
    }

    let [x, y]: [f64; 2] = UnitCircle.sample(rng);
    let unit = bounded(speed_unit, 0.0, MAX_DRIFT_SPEED_UNIT);
    let speed = rng.gen_range(unit * DRIFT_SPEED_MIN_FACTOR..=unit * DRIFT_SPEED_MAX_FACTOR);
    Some(Velocity::new(x * speed, y * speed))
}

/// Draws a uniformly distributed centre position within `bounds`.
pub fn sample_position<R>(rng: &mut R, bounds: &PlacementBounds) -> Point
where
    R: Rng + ?Sized,
{
    Point::new(
        rng.gen_range(bounds.min_x..=bounds.max_x),
        rng.gen_range(bounds.min_y..=bounds.max_y),
    )
}

/// Visible fraction of a target at `progress` through its lifetime.
///
/// Normal targets fade in along `progress^0.9`. Faders ramp up to their peak
/// at mid-life and back down, each half following the same curve.
#[must_use]
pub fn visible_fraction(fade: FadeKind, progress: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    match fade {
        FadeKind::Normal => progress.powf(VISIBILITY_EXPONENT),
        FadeKind::Fader { peak_visibility } => {
            let local = if progress <= 0.5 {
                progress / 0.5
            } else {
                (1.0 - progress) / 0.5
            };
            local.powf(VISIBILITY_EXPONENT) * peak_visibility
        }
    }
}

/// Moves `position` by `velocity * dt`, reflecting off `bounds` on each axis independently.
pub fn integrate_drift(
    position: &mut Point,
    velocity: &mut Velocity,
    bounds: &PlacementBounds,
    dt: Duration,
) {
    let seconds = dt.as_secs_f64();
    position.x += velocity.x * seconds;
    position.y += velocity.y * seconds;
    reflect_axis(&mut position.x, &mut velocity.x, bounds.min_x, bounds.max_x);
    reflect_axis(&mut position.y, &mut velocity.y, bounds.min_y, bounds.max_y);
}

fn reflect_axis(coordinate: &mut f64, velocity: &mut f64, min: f64, max: f64) {
    if *coordinate < min {
        *coordinate = min;
        *velocity = velocity.abs();
    } else if *coordinate > max {
        *coordinate = max;
        *velocity = -velocity.abs();
    }
}

/// Live target record driven by the session clock.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    id: TargetId,
    parameters: StimulusParameters,
    pixels: PixelBuffer,
    fade: FadeKind,
    duration: Duration,
    scoring: ScoringSnapshot,
    spawned_at: Duration,
    position: Point,
    velocity: Option<Velocity>,
    visible: f64,
    resolution: Resolution,
}

impl Target {
    /// Creates an active target from its plan, anchored at `spawned_at`.
    #[must_use]
    pub fn spawn(id: TargetId, plan: TargetPlan, spawned_at: Duration) -> Self {
        Self {
            id,
            parameters: plan.parameters,
            pixels: plan.pixels,
            fade: plan.fade,
            duration: plan.duration,
            scoring: plan.scoring,
            spawned_at,
            position: plan.position,
            velocity: plan.drift,
            visible: 0.0,
            resolution: Resolution::Active,
        }
    }

    /// Identifier of the target.
    #[must_use]
    pub const fn id(&self) -> TargetId {
        self.id
    }

    /// Stimulus parameters captured at spawn.
    #[must_use]
    pub const fn parameters(&self) -> &StimulusParameters {
        &self.parameters
    }

    /// Pixels rendered at spawn.
    #[must_use]
    pub const fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Fade curve of the target.
    #[must_use]
    pub const fn fade(&self) -> FadeKind {
        self.fade
    }

    /// Lifetime of the target.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Session time the target spawned at.
    #[must_use]
    pub const fn spawned_at(&self) -> Duration {
        self.spawned_at
    }

    /// Current centre position.
    #[must_use]
    pub const fn position(&self) -> Point {
        self.position
    }

    /// Drift velocity, if the target drifts.
    #[must_use]
    pub const fn velocity(&self) -> Option<Velocity> {
        self.velocity
    }

    /// Visible fraction computed by the most recent tick.
    #[must_use]
    pub const fn visible(&self) -> f64 {
        self.visible
    }

    /// Resolution state of the target.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reports whether the target already resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Active
    }

    /// Rectangle currently occupied by the stimulus.
    #[must_use]
    pub fn placement(&self) -> PlacementRect {
        PlacementRect::centered(self.position, self.parameters.size)
    }

    /// Fraction of the lifetime that elapsed at session time `now`.
    #[must_use]
    pub fn progress(&self, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.spawned_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Advances the target to session time `now`, `dt` after the previous tick.
    ///
    /// Returns [`Outcome::Miss`] when the target expires during this tick.
    pub fn advance(
        &mut self,
        now: Duration,
        dt: Duration,
        bounds: &PlacementBounds,
    ) -> Option<Outcome> {
        if self.is_resolved() {
            return None;
        }

        if let Some(velocity) = self.velocity.as_mut() {
            integrate_drift(&mut self.position, velocity, bounds, dt);
        }

        let progress = self.progress(now);
        self.visible = visible_fraction(self.fade, progress);

        if progress >= 1.0 {
            self.resolution = Resolution::Miss;
            return Some(Outcome::Miss);
        }
        None
    }

    /// Resolves the target for a selection made at session time `at`.
    ///
    /// Selections at or after expiry resolve as a miss. Returns `None` when the
    /// target already resolved.
    pub fn select(&mut self, at: Duration) -> Option<Outcome> {
        if self.is_resolved() {
            return None;
        }

        let elapsed = at.saturating_sub(self.spawned_at);
        if elapsed >= self.duration {
            self.resolution = Resolution::Miss;
            return Some(Outcome::Miss);
        }

        let points = hit_score(
            elapsed,
            self.duration,
            self.scoring.max_perfect_score,
            self.scoring.exponent,
        );
        self.resolution = Resolution::Hit;
        Some(Outcome::Hit { points, elapsed })
    }

    /// Immutable snapshot used by queries.
    #[must_use]
    pub fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            id: self.id,
            position: self.position,
            placement: self.placement(),
            fade: self.fade,
            visible: self.visible,
            duration: self.duration,
            spawned_at: self.spawned_at,
            drifting: self.velocity.is_some(),
            resolution: self.resolution,
        }
    }
}

fn probability(value: f64) -> f64 {
    bounded(value, 0.0, 1.0)
}

fn bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
