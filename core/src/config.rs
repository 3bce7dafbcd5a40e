//! Session configuration surface shared by every system.
//!
//! Adapters deserialize [`SessionConfig`] from TOML; every field carries a
//! default so partial files stay valid. Stimulus numerics are never rejected
//! here because the renderer clamps them; only structural problems surface as
//! [`ConfigurationError`].

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Arena, FadeBounds, Rgb};

/// Smallest stimulus edge length the engine will present.
pub const MIN_PATCH_SIZE: u32 = 28;
/// Largest stimulus edge length the engine will present.
pub const MAX_PATCH_SIZE: u32 = 220;

/// Largest arena width or height, in pixels.
pub const MAX_ARENA_EXTENT: f64 = 16_384.0;
/// Shortest interval between spawn attempts; shorter configured intervals are raised to it.
pub const MIN_SPAWN_INTERVAL_SECS: f64 = 0.01;

/// Fader probability applied while the `fader` mode override is active.
pub const FADER_MODE_FADER_PROBABILITY: f64 = 0.3;
/// Drift probability applied while the `drift` mode override is active.
pub const DRIFT_MODE_DRIFT_PROBABILITY: f64 = 0.4;

/// Structural misconfiguration detected while validating or spawning.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    /// The stimulus edge length cannot produce a pixel buffer.
    #[error("stimulus size must be at least {minimum} px (received {size})")]
    InvalidPatchSize {
        /// Edge length that failed validation.
        size: u32,
        /// Smallest accepted edge length in this context.
        minimum: u32,
    },
    /// A numeric parameter was NaN or infinite.
    #[error("parameter `{name}` must be finite (received {value})")]
    NonFiniteParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Value that failed validation.
        value: f64,
    },
    /// The arena cannot hold a stimulus of the requested size.
    #[error("arena {width}x{height} (margin {margin}) cannot hold a {size}px stimulus")]
    ArenaTooSmall {
        /// Arena width in pixels.
        width: f64,
        /// Arena height in pixels.
        height: f64,
        /// Inset margin applied on every edge.
        margin: f64,
        /// Stimulus edge length that did not fit.
        size: u32,
    },
    /// Any other structural inconsistency.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human readable description of the inconsistency.
        reason: String,
    },
}

impl ConfigurationError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Probabilities that replace the adaptive fader/drift fractions while a mode is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModeOverrides {
    /// Replacement probability that a spawned target is a fader.
    pub fader_probability: Option<f64>,
    /// Replacement probability that a spawned target drifts.
    pub drift_probability: Option<f64>,
}

/// Every recognised tuning option of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Base stimulus edge length in pixels.
    pub patch_size: u32,
    /// Seconds between spawn attempts.
    pub spawn_interval_secs: f64,
    /// Maximum number of simultaneously active targets.
    pub max_concurrent: usize,
    /// Lower bound of the normal fade duration in seconds.
    pub fade_min_secs: f64,
    /// Upper bound of the normal fade duration in seconds.
    pub fade_max_secs: f64,
    /// Drift probability before any score has been accumulated.
    pub drift_base_fraction: f64,
    /// Drift probability added for every 500 points of cumulative score.
    pub drift_increment_per_500: f64,
    /// Ceiling on the drift probability.
    pub drift_max_fraction: f64,
    /// Base drift speed in pixels per second.
    pub drift_speed_unit: f64,
    /// Requested carrier wavelength in pixels.
    pub wavelength: f64,
    /// Base carrier orientation in degrees.
    pub orientation_deg: f64,
    /// Maximum random deviation from the base orientation in degrees.
    pub orientation_jitter_deg: f64,
    /// Michelson contrast requested for new stimuli.
    pub contrast: f64,
    /// Requested Gaussian envelope radius in pixels.
    pub sigma: f64,
    /// Luminance quantization level count (0 = continuous, otherwise 4..=8).
    pub quantization_levels: u8,
    /// Background color the stimulus is blended against.
    pub background_color: Rgb,
    /// Multiplier applied to the background mean luminance.
    pub brightness: f64,
    /// Whether each stimulus receives a random carrier phase.
    pub phase_randomized: bool,
    /// Penalty applied to the first miss of a streak.
    pub base_penalty: u32,
    /// Extra penalty for every preceding consecutive miss.
    pub per_miss_increment: u32,
    /// Points awarded for an instantaneous selection.
    pub max_perfect_score: u32,
    /// Exponent shaping how fast the hit score decays.
    pub scoring_exponent: f64,
    /// Cumulative score at which fader targets start appearing.
    pub fader_activation_score: u64,
    /// Lower bound of a fader's peak visibility, expressed in points.
    pub fader_min_visibility: f64,
    /// Upper bound of a fader's peak visibility, expressed in points.
    pub fader_max_visibility: f64,
    /// Arena width in pixels.
    pub arena_width: f64,
    /// Arena height in pixels.
    pub arena_height: f64,
    /// Inset margin kept free on every arena edge.
    pub arena_margin: f64,
    /// Seed for every random stream of the session.
    pub seed: u64,
    /// Name of the override table applied to new spawns, if any.
    pub active_mode: Option<String>,
    /// Named override tables.
    pub modes: BTreeMap<String, ModeOverrides>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            patch_size: 88,
            spawn_interval_secs: 1.0,
            max_concurrent: 3,
            fade_min_secs: 2.5,
            fade_max_secs: 4.5,
            drift_base_fraction: 0.10,
            drift_increment_per_500: 0.10,
            drift_max_fraction: 0.60,
            drift_speed_unit: 24.0,
            wavelength: 12.0,
            orientation_deg: 0.0,
            orientation_jitter_deg: 90.0,
            contrast: 0.5,
            sigma: 18.0,
            quantization_levels: 0,
            background_color: Rgb::new(0x80, 0x80, 0x80),
            brightness: 1.0,
            phase_randomized: true,
            base_penalty: 5,
            per_miss_increment: 2,
            max_perfect_score: 50,
            scoring_exponent: 2.0,
            fader_activation_score: 1_500,
            fader_min_visibility: 20.0,
            fader_max_visibility: 45.0,
            arena_width: 960.0,
            arena_height: 640.0,
            arena_margin: 12.0,
            seed: 0x5eed_0f_9ab0,
            active_mode: None,
            modes: builtin_modes(),
        }
    }
}

fn builtin_modes() -> BTreeMap<String, ModeOverrides> {
    let mut modes = BTreeMap::new();
    let _ = modes.insert(
        "fader".to_owned(),
        ModeOverrides {
            fader_probability: Some(FADER_MODE_FADER_PROBABILITY),
            drift_probability: None,
        },
    );
    let _ = modes.insert(
        "drift".to_owned(),
        ModeOverrides {
            fader_probability: None,
            drift_probability: Some(DRIFT_MODE_DRIFT_PROBABILITY),
        },
    );
    modes
}

impl SessionConfig {
    /// Reports structural problems that would stop the engine from spawning anything.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in self.numeric_fields() {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFiniteParameter { name, value });
            }
        }

        if self.patch_size < MIN_PATCH_SIZE {
            return Err(ConfigurationError::InvalidPatchSize {
                size: self.patch_size,
                minimum: MIN_PATCH_SIZE,
            });
        }
        if self.max_concurrent == 0 {
            return Err(ConfigurationError::invalid("max_concurrent must be positive"));
        }
        if self.spawn_interval_secs <= 0.0 {
            return Err(ConfigurationError::invalid(
                "spawn_interval_secs must be positive",
            ));
        }
        if self.fade_min_secs <= 0.0 || self.fade_min_secs > self.fade_max_secs {
            return Err(ConfigurationError::invalid(format!(
                "fade bounds must satisfy 0 < fade_min_secs <= fade_max_secs (received {} and {})",
                self.fade_min_secs, self.fade_max_secs
            )));
        }
        if self.max_perfect_score == 0 {
            return Err(ConfigurationError::invalid(
                "max_perfect_score must be positive",
            ));
        }
        if self.arena_width > MAX_ARENA_EXTENT || self.arena_height > MAX_ARENA_EXTENT {
            return Err(ConfigurationError::invalid(format!(
                "arena must be at most {MAX_ARENA_EXTENT} px per side (received {}x{})",
                self.arena_width, self.arena_height
            )));
        }
        if let Some(mode) = &self.active_mode {
            if !self.modes.contains_key(mode) {
                return Err(ConfigurationError::invalid(format!(
                    "active_mode `{mode}` has no override table"
                )));
            }
        }

        let _ = self.arena().placement_bounds(self.stimulus_size())?;
        Ok(())
    }

    /// Edge length used for new stimuli: the configured base, capped, never upscaled.
    #[must_use]
    pub fn stimulus_size(&self) -> u32 {
        self.patch_size.min(MAX_PATCH_SIZE)
    }

    /// Interval between spawn attempts, never shorter than [`MIN_SPAWN_INTERVAL_SECS`].
    #[must_use]
    pub fn spawn_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.spawn_interval_secs.max(MIN_SPAWN_INTERVAL_SECS))
            .unwrap_or(Duration::MAX)
    }

    /// Fade duration bounds in effect before any level promotion.
    #[must_use]
    pub fn fade_bounds(&self) -> FadeBounds {
        FadeBounds::from_secs(self.fade_min_secs, self.fade_max_secs)
    }

    /// Arena extent and margin targets are placed within.
    #[must_use]
    pub fn arena(&self) -> Arena {
        Arena::new(self.arena_width, self.arena_height, self.arena_margin)
    }

    /// Looks up a named override table.
    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&ModeOverrides> {
        self.modes.get(name)
    }

    /// Override table selected by `active_mode`, if any.
    #[must_use]
    pub fn active_overrides(&self) -> Option<&ModeOverrides> {
        self.active_mode.as_deref().and_then(|name| self.mode(name))
    }

    fn numeric_fields(&self) -> [(&'static str, f64); 19] {
        [
            ("spawn_interval_secs", self.spawn_interval_secs),
            ("fade_min_secs", self.fade_min_secs),
            ("fade_max_secs", self.fade_max_secs),
            ("drift_base_fraction", self.drift_base_fraction),
            ("drift_increment_per_500", self.drift_increment_per_500),
            ("drift_max_fraction", self.drift_max_fraction),
            ("drift_speed_unit", self.drift_speed_unit),
            ("wavelength", self.wavelength),
            ("orientation_deg", self.orientation_deg),
            ("orientation_jitter_deg", self.orientation_jitter_deg),
            ("contrast", self.contrast),
            ("sigma", self.sigma),
            ("brightness", self.brightness),
            ("scoring_exponent", self.scoring_exponent),
            ("fader_min_visibility", self.fader_min_visibility),
            ("fader_max_visibility", self.fader_max_visibility),
            ("arena_width", self.arena_width),
            ("arena_height", self.arena_height),
            ("arena_margin", self.arena_margin),
        ]
    }
}

/// Error produced when a `#rrggbb` color string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("expected a `#rrggbb` color, received `{0}`")]
pub struct ColorParseError(pub String);

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse_hex(&value).ok_or(ColorParseError(value))
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red(), self.green(), self.blue())
    }
}
