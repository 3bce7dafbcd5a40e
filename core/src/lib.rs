#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gabor Hunt engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative session, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations (ticks, selections, pause/resume), the session
//! executes those commands via its `apply` entry point, and then broadcasts
//! [`Event`] values that score displays and other collaborators observe.
//! Systems consume event streams, query immutable snapshots, and respond
//! exclusively with new command batches.

mod config;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use config::{
    ColorParseError, ConfigurationError, ModeOverrides, SessionConfig,
    DRIFT_MODE_DRIFT_PROBABILITY, FADER_MODE_FADER_PROBABILITY, MAX_ARENA_EXTENT, MAX_PATCH_SIZE,
    MIN_PATCH_SIZE, MIN_SPAWN_INTERVAL_SECS,
};

/// Describes whether the session clock is advancing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Ticks advance the clock, spawn targets and fade them.
    Running,
    /// The clock is frozen; ticks, spawns and selections are ignored.
    Paused,
}

/// Commands that express all permissible session mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the session clock to the provided host timestamp.
    Tick {
        /// Monotonic host timestamp; elapsed time is derived from successive values.
        now: Duration,
    },
    /// Requests insertion of a fully planned target.
    SpawnTarget {
        /// Immutable description of the target to create.
        plan: Box<TargetPlan>,
    },
    /// Reports a spawn attempt the scheduler dropped before planning completed.
    SkipSpawn {
        /// Reason the attempt was dropped.
        reason: SpawnSkipReason,
    },
    /// Reports that the user selected a target.
    Select {
        /// Identifier of the selected target.
        target: TargetId,
        /// Host timestamp at which the selection happened.
        at: Duration,
    },
    /// Freezes the session clock without touching any target anchor.
    Pause,
    /// Restarts the session clock, re-anchoring it at the provided host timestamp.
    Resume {
        /// Host timestamp at which the clock resumes.
        now: Duration,
    },
    /// Switches the override table applied to subsequent spawns.
    SetMode {
        /// Name of the override table, or `None` to fall back to adaptive fractions.
        mode: Option<String>,
    },
    /// Destroys every live target without emitting outcomes.
    Clear,
    /// Clears every target and restores the initial difficulty and statistics.
    ResetSession,
}

/// Events broadcast by the session after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the session clock advanced.
    TimeAdvanced {
        /// Session time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a target was inserted into the arena.
    TargetSpawned {
        /// Identifier assigned to the new target.
        target: TargetId,
        /// Rectangle occupied by the stimulus at spawn time.
        placement: PlacementRect,
        /// Fade curve assigned to the target.
        fade: FadeKind,
        /// Whether the target drifts across the arena.
        drifting: bool,
    },
    /// Reports that a spawn attempt was dropped.
    SpawnSkipped {
        /// Reason the attempt was dropped.
        reason: SpawnSkipReason,
    },
    /// A target was selected before it faded out.
    TargetHit {
        /// Identifier of the resolved target.
        target: TargetId,
        /// Points awarded for the selection.
        points: u32,
        /// Time between spawn and selection.
        elapsed: Duration,
    },
    /// A target faded out (or was selected too late) without a hit.
    TargetMissed {
        /// Identifier of the resolved target.
        target: TargetId,
        /// Points deducted from the cumulative score.
        penalty: u32,
    },
    /// A target was destroyed by a clear or reset; no outcome is implied.
    TargetCleared {
        /// Identifier of the destroyed target.
        target: TargetId,
    },
    /// The cumulative score changed.
    ScoreChanged {
        /// Cumulative score after the change.
        score: u64,
    },
    /// The session was promoted to a higher difficulty level.
    LevelUp {
        /// Level that became active.
        level: Level,
    },
    /// The probability that new targets drift changed.
    DriftFractionChanged {
        /// Drift probability now in effect.
        fraction: f64,
    },
    /// Fader targets became eligible for spawning.
    FaderActivated,
    /// The session clock was frozen.
    SessionPaused,
    /// The session clock resumed.
    SessionResumed,
    /// The active override table changed.
    ModeChanged {
        /// Name of the active override table, if any.
        mode: Option<String>,
    },
}

/// Reasons a spawn attempt may be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnSkipReason {
    /// The maximum number of concurrent targets is already active.
    AtCapacity,
    /// The plan does not fit the arena or its stimulus is structurally invalid.
    Misconfigured,
    /// The session is paused.
    Paused,
}

/// Unique identifier assigned to a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(u32);

impl TargetId {
    /// Creates a new target identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Difficulty level of a session. Promotion is one-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Level(u8);

impl Level {
    /// Level every session starts at.
    pub const ONE: Level = Level(1);
    /// Level reached after sustained high scores.
    pub const TWO: Level = Level(2);

    /// Retrieves the numeric level.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Opaque 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    red: u8,
    green: u8,
    blue: u8,
}

impl Rgb {
    /// Creates a new color from byte components.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parses a `#rrggbb` (or `rrggbb`) hex string.
    #[must_use]
    pub fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Red component of the color.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Green component of the color.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Blue component of the color.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }
}

/// Position within the arena measured in pixels from the upper-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Drift velocity measured in pixels per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

impl Velocity {
    /// Creates a new velocity.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Magnitude of the velocity.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Extent of the playing field that targets are placed in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arena {
    width: f64,
    height: f64,
    margin: f64,
}

impl Arena {
    /// Creates an arena description.
    #[must_use]
    pub const fn new(width: f64, height: f64, margin: f64) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    /// Arena width in pixels.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Arena height in pixels.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Inset margin kept free on every edge.
    #[must_use]
    pub const fn margin(&self) -> f64 {
        self.margin
    }

    /// Range of centre positions that keep a `size`-pixel stimulus inside the inset arena.
    pub fn placement_bounds(&self, size: u32) -> Result<PlacementBounds, ConfigurationError> {
        for (name, value) in [
            ("arena_width", self.width),
            ("arena_height", self.height),
            ("arena_margin", self.margin),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFiniteParameter { name, value });
            }
        }
        if self.margin < 0.0 {
            return Err(ConfigurationError::InvalidConfig {
                reason: format!("arena_margin must not be negative (received {})", self.margin),
            });
        }

        let half = f64::from(size) / 2.0;
        let min_x = self.margin + half;
        let max_x = self.width - self.margin - half;
        let min_y = self.margin + half;
        let max_y = self.height - self.margin - half;

        if size == 0 || !(min_x <= max_x && min_y <= max_y) {
            return Err(ConfigurationError::ArenaTooSmall {
                width: self.width,
                height: self.height,
                margin: self.margin,
                size,
            });
        }

        Ok(PlacementBounds {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }
}

/// Inclusive range of admissible target centres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementBounds {
    /// Smallest admissible horizontal centre.
    pub min_x: f64,
    /// Largest admissible horizontal centre.
    pub max_x: f64,
    /// Smallest admissible vertical centre.
    pub min_y: f64,
    /// Largest admissible vertical centre.
    pub max_y: f64,
}

impl PlacementBounds {
    /// Reports whether the point lies within the bounds.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }
}

/// Square screen rectangle occupied by a stimulus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRect {
    /// Left edge in arena pixels.
    pub left: f64,
    /// Top edge in arena pixels.
    pub top: f64,
    /// Edge length in pixels.
    pub size: u32,
}

impl PlacementRect {
    /// Rectangle of a `size`-pixel stimulus centred on `center`.
    #[must_use]
    pub fn centered(center: Point, size: u32) -> Self {
        let half = f64::from(size) / 2.0;
        Self {
            left: center.x - half,
            top: center.y - half,
            size,
        }
    }
}

/// Immutable stimulus description captured when a target is planned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StimulusParameters {
    /// Edge length of the square pixel buffer.
    pub size: u32,
    /// Carrier wavelength λ in pixels.
    pub wavelength: f64,
    /// Carrier orientation θ in radians.
    pub orientation: f64,
    /// Carrier phase φ in radians.
    pub phase: f64,
    /// Gaussian envelope radius σ in pixels.
    pub sigma: f64,
    /// Requested Michelson contrast.
    pub contrast: f64,
    /// Multiplier applied to the background mean luminance.
    pub brightness: f64,
    /// Quantization level count; 0 renders continuous luminance.
    pub quantization_levels: u8,
    /// Background color the stimulus is blended against.
    pub background: Rgb,
}

/// Square, luminance-only image produced for one stimulus.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixelBuffer {
    size: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps row-major luminance samples. Returns `None` when the length does not match.
    #[must_use]
    pub fn from_luminance(size: u32, pixels: Vec<u8>) -> Option<Self> {
        let side = usize::try_from(size).ok()?;
        (side.checked_mul(side)? == pixels.len()).then_some(Self { size, pixels })
    }

    /// Edge length of the buffer.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Row-major luminance samples.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Luminance at the provided column and row, if in bounds.
    #[must_use]
    pub fn get(&self, column: u32, row: u32) -> Option<u8> {
        if column >= self.size || row >= self.size {
            return None;
        }
        let index = usize::try_from(row).ok()? * usize::try_from(self.size).ok()?
            + usize::try_from(column).ok()?;
        self.pixels.get(index).copied()
    }
}

/// Visibility curve assigned to a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadeKind {
    /// Fades in monotonically until it expires.
    Normal,
    /// Ramps up to a peak at mid-life and back down.
    Fader {
        /// Visibility reached at the peak, in `(0, 1]`.
        peak_visibility: f64,
    },
}

impl FadeKind {
    /// Reports whether the kind is [`FadeKind::Fader`].
    #[must_use]
    pub const fn is_fader(&self) -> bool {
        matches!(self, Self::Fader { .. })
    }
}

/// Range normal fade durations are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FadeBounds {
    /// Shortest normal fade.
    pub min: Duration,
    /// Longest normal fade (outliers excepted).
    pub max: Duration,
}

impl FadeBounds {
    /// Builds bounds from second values, rounded to whole milliseconds.
    #[must_use]
    pub fn from_secs(min: f64, max: f64) -> Self {
        Self {
            min: whole_millis(min * 1_000.0),
            max: whole_millis(max * 1_000.0),
        }
    }

    /// Multiplies both bounds, rounding to whole milliseconds.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            min: whole_millis(self.min.as_secs_f64() * 1_000.0 * factor),
            max: whole_millis(self.max.as_secs_f64() * 1_000.0 * factor),
        }
    }
}

fn whole_millis(millis: f64) -> Duration {
    if !millis.is_finite() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis(millis.round() as u64)
}

/// Scoring constants captured at spawn so later promotions never alter an in-flight target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringSnapshot {
    /// Points awarded for an instantaneous selection.
    pub max_perfect_score: u32,
    /// Exponent shaping how fast the hit score decays.
    pub exponent: f64,
}

/// Complete, immutable description of a target about to be spawned.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetPlan {
    /// Stimulus parameters captured for the target.
    pub parameters: StimulusParameters,
    /// Pixels rendered once from `parameters`.
    pub pixels: PixelBuffer,
    /// Fade curve of the target.
    pub fade: FadeKind,
    /// Lifetime from spawn until the target expires.
    pub duration: Duration,
    /// Initial centre position.
    pub position: Point,
    /// Drift velocity, if the target drifts.
    pub drift: Option<Velocity>,
    /// Scoring constants used on resolution.
    pub scoring: ScoringSnapshot,
}

/// Resolution state of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// The target is still fading.
    Active,
    /// The target was selected in time.
    Hit,
    /// The target expired or was selected too late.
    Miss,
}

/// Immutable representation of a single target's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSnapshot {
    /// Unique identifier assigned to the target.
    pub id: TargetId,
    /// Current centre position.
    pub position: Point,
    /// Rectangle currently occupied by the stimulus.
    pub placement: PlacementRect,
    /// Fade curve of the target.
    pub fade: FadeKind,
    /// Current visible fraction in `[0, 1]`.
    pub visible: f64,
    /// Lifetime of the target.
    pub duration: Duration,
    /// Session time at which the target spawned.
    pub spawned_at: Duration,
    /// Whether the target drifts.
    pub drifting: bool,
    /// Resolution state of the target.
    pub resolution: Resolution,
}

/// Read-only snapshot describing all live targets.
#[derive(Clone, Debug, Default)]
pub struct TargetView {
    snapshots: Vec<TargetSnapshot>,
}

impl TargetView {
    /// Creates a new target view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TargetSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &TargetSnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no target was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TargetSnapshot> {
        self.snapshots
    }
}

/// Adaptive difficulty state owned by the session.
///
/// Only the scoring engine (hit/miss outcomes) and the difficulty controller
/// (recomputation) mutate this value.
#[derive(Clone, Debug, PartialEq)]
pub struct DifficultyState {
    /// Cumulative score, never negative.
    pub score: u64,
    /// Number of hits recorded.
    pub hits: u32,
    /// Total points earned from hits, ignoring penalties.
    pub hit_points: u64,
    /// Misses immediately preceding the next outcome.
    pub consecutive_misses: u32,
    /// Current level; never decreases.
    pub level: Level,
    /// Exponent used to score new targets.
    pub scoring_exponent: f64,
    /// Fade bounds used for new targets.
    pub fade_bounds: FadeBounds,
    /// Probability that a new target drifts.
    pub drift_fraction: f64,
    /// Probability that a new target is a fader.
    pub fader_fraction: f64,
    /// Contrast requested for new stimuli.
    pub contrast: f64,
}

impl DifficultyState {
    /// Initial state derived from configuration.
    #[must_use]
    pub fn initial(config: &SessionConfig) -> Self {
        Self {
            score: 0,
            hits: 0,
            hit_points: 0,
            consecutive_misses: 0,
            level: Level::ONE,
            scoring_exponent: config.scoring_exponent,
            fade_bounds: config.fade_bounds(),
            drift_fraction: config
                .drift_base_fraction
                .min(config.drift_max_fraction)
                .clamp(0.0, 1.0),
            fader_fraction: 0.0,
            contrast: config.contrast,
        }
    }

    /// Mean points per hit, if any hit was recorded.
    #[must_use]
    pub fn average_hit_points(&self) -> Option<f64> {
        (self.hits > 0).then(|| self.hit_points as f64 / f64::from(self.hits))
    }
}

/// Aggregated outcome statistics of a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Number of hits.
    pub hits: u32,
    /// Number of misses.
    pub misses: u32,
    /// Cumulative score.
    pub score: u64,
    /// Current level number.
    pub level: u8,
    /// Longest run of consecutive hits.
    pub best_streak: u32,
    /// Mean time from spawn to hit, if any hit was recorded.
    pub mean_reaction: Option<Duration>,
    /// Number of targets spawned.
    pub spawned: u32,
}

impl SessionSummary {
    /// Fraction of resolved targets that were hits.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        let resolved = self.hits + self.misses;
        (resolved > 0).then(|| f64::from(self.hits) / f64::from(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn summary_round_trips_through_bincode() {
        assert_round_trip(&SessionSummary {
            hits: 7,
            misses: 2,
            score: 212,
            level: 2,
            best_streak: 5,
            mean_reaction: Some(Duration::from_millis(640)),
            spawned: 10,
        });
    }

    #[test]
    fn hex_colors_parse_with_or_without_hash() {
        assert_eq!(Rgb::parse_hex("#80ff00"), Some(Rgb::new(0x80, 0xff, 0x00)));
        assert_eq!(Rgb::parse_hex("0a0b0c"), Some(Rgb::new(0x0a, 0x0b, 0x0c)));
        assert_eq!(Rgb::parse_hex("#80ff0"), None);
        assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
        assert_eq!(Rgb::new(1, 2, 255).to_string(), "#0102ff");
    }

    #[test]
    fn placement_bounds_respect_margin_and_size() {
        let arena = Arena::new(200.0, 100.0, 10.0);
        let bounds = arena.placement_bounds(40).expect("stimulus fits");

        assert_eq!(bounds.min_x, 30.0);
        assert_eq!(bounds.max_x, 170.0);
        assert_eq!(bounds.min_y, 30.0);
        assert_eq!(bounds.max_y, 70.0);
        assert!(bounds.contains(Point::new(100.0, 50.0)));
        assert!(!bounds.contains(Point::new(20.0, 50.0)));
    }

    #[test]
    fn undersized_arena_is_rejected() {
        let arena = Arena::new(50.0, 50.0, 10.0);
        assert!(matches!(
            arena.placement_bounds(40),
            Err(ConfigurationError::ArenaTooSmall { size: 40, .. })
        ));
        assert!(arena.placement_bounds(0).is_err());
    }

    #[test]
    fn negative_margins_are_rejected() {
        let arena = Arena::new(960.0, 640.0, -1.0e308);
        assert!(matches!(
            arena.placement_bounds(88),
            Err(ConfigurationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn fade_bounds_scale_to_whole_milliseconds() {
        let bounds = FadeBounds::from_secs(2.5, 4.5).scaled(1.25);
        assert_eq!(bounds.min, Duration::from_millis(3_125));
        assert_eq!(bounds.max, Duration::from_millis(5_625));
    }

    #[test]
    fn pixel_buffer_rejects_mismatched_lengths() {
        assert!(PixelBuffer::from_luminance(3, vec![0; 8]).is_none());
        let buffer = PixelBuffer::from_luminance(2, vec![1, 2, 3, 4]).expect("matching length");
        assert_eq!(buffer.get(1, 1), Some(4));
        assert_eq!(buffer.get(2, 0), None);
    }

    #[test]
    fn accuracy_ignores_unresolved_sessions() {
        assert_eq!(SessionSummary::default().accuracy(), None);
        let summary = SessionSummary {
            hits: 3,
            misses: 1,
            ..SessionSummary::default()
        };
        assert_eq!(summary.accuracy(), Some(0.75));
    }
}
