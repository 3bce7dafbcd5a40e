#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Gabor Hunt adapters.
//!
//! Hosts receive each stimulus as a square luminance buffer together with the
//! rectangle it occupies in the arena. [`compose_frame`] blends every visible
//! target onto an arena-sized canvas so headless hosts can capture complete
//! frames; [`PgmHost`] writes both kinds of image as binary PGM files.

use std::{
    error::Error,
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result as AnyResult};
use gabor_hunt_core::{Arena, PixelBuffer, PlacementRect, Rgb, TargetId, TargetSnapshot};
use gabor_hunt_system_stimulus::perceptual_luminance;
use glam::{DVec2, IVec2};

/// Target as presented by a rendering host.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneTarget {
    /// Identifier of the presented target.
    pub id: TargetId,
    /// Rectangle the stimulus occupies within the arena.
    pub placement: PlacementRect,
    /// Visible fraction in `[0, 1]` used to blend the stimulus over the background.
    pub visible: f64,
    /// Pixels rendered when the target was planned.
    pub pixels: PixelBuffer,
}

impl SceneTarget {
    /// Creates a scene target from a session snapshot and the target's pixels.
    #[must_use]
    pub fn new(snapshot: &TargetSnapshot, pixels: PixelBuffer) -> Self {
        Self {
            id: snapshot.id,
            placement: snapshot.placement,
            visible: snapshot.visible.clamp(0.0, 1.0),
            pixels,
        }
    }
}

/// Scene description combining the arena background with its live targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Arena the targets are placed in.
    pub arena: Arena,
    /// Background color the stimuli are blended against.
    pub background: Rgb,
    /// Multiplier applied to the background luminance.
    pub brightness: f64,
    /// Targets currently presented, in ascending identifier order.
    pub targets: Vec<SceneTarget>,
}

impl Scene {
    /// Creates a new scene descriptor.
    #[must_use]
    pub fn new(
        arena: Arena,
        background: Rgb,
        brightness: f64,
        mut targets: Vec<SceneTarget>,
    ) -> Self {
        targets.sort_by_key(|target| target.id);
        Self {
            arena,
            background,
            brightness,
            targets,
        }
    }

    /// Luminance of an empty arena pixel.
    #[must_use]
    pub fn background_luminance(&self) -> u8 {
        to_byte(perceptual_luminance(self.background) * self.brightness)
    }
}

/// Arena-sized luminance canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Creates a frame filled with `luminance`.
    pub fn filled(width: u32, height: u32, luminance: u8) -> Result<Self, RenderingError> {
        let area = usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(width, height)| width.checked_mul(height))
            .filter(|area| *area > 0)
            .ok_or(RenderingError::EmptyCanvas { width, height })?;
        Ok(Self {
            width,
            height,
            pixels: vec![luminance; area],
        })
    }

    /// Canvas width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major luminance samples.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Luminance at the provided column and row, if in bounds.
    #[must_use]
    pub fn get(&self, column: u32, row: u32) -> Option<u8> {
        self.index(IVec2::new(column as i32, row as i32))
            .and_then(|index| self.pixels.get(index).copied())
    }

    fn index(&self, at: IVec2) -> Option<usize> {
        let column = u32::try_from(at.x).ok().filter(|column| *column < self.width)?;
        let row = u32::try_from(at.y).ok().filter(|row| *row < self.height)?;
        Some(row as usize * self.width as usize + column as usize)
    }
}

/// Blends every target of `scene` onto a canvas of the arena's background.
///
/// Each stimulus pixel is mixed with the background by the target's visible
/// fraction. Pixels falling outside the canvas are discarded.
pub fn compose_frame(scene: &Scene) -> Result<Frame, RenderingError> {
    let width = canvas_extent(scene.arena.width());
    let height = canvas_extent(scene.arena.height());
    let background = scene.background_luminance();
    let mut frame = Frame::filled(width, height, background)?;

    for target in &scene.targets {
        let origin = DVec2::new(target.placement.left, target.placement.top)
            .round()
            .as_ivec2();
        let size = target.pixels.size();
        for row in 0..size {
            for column in 0..size {
                let Some(stimulus) = target.pixels.get(column, row) else {
                    continue;
                };
                let at = origin + IVec2::new(column as i32, row as i32);
                let Some(index) = frame.index(at) else {
                    continue;
                };
                let base = f64::from(frame.pixels[index]);
                let blended = base + target.visible * (f64::from(stimulus) - base);
                frame.pixels[index] = to_byte(blended);
            }
        }
    }

    Ok(frame)
}

/// Encodes a luminance image as a binary (`P5`) PGM file.
#[must_use]
pub fn encode_pgm(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
    let header = format!("P5\n{width} {height}\n255\n");
    let mut bytes = Vec::with_capacity(header.len() + pixels.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(pixels);
    bytes
}

/// Rendering host capable of presenting Gabor Hunt stimuli and frames.
pub trait RenderHost {
    /// Presents a single `size×size` stimulus at its arena placement.
    fn present_stimulus(&mut self, placement: PlacementRect, pixels: &PixelBuffer)
        -> AnyResult<()>;

    /// Presents a fully composed frame.
    fn present_frame(&mut self, frame: &Frame) -> AnyResult<()>;
}

/// Headless host writing every presented image as a numbered PGM file.
#[derive(Debug)]
pub struct PgmHost {
    directory: PathBuf,
    written: Vec<PathBuf>,
}

impl PgmHost {
    /// Creates a host writing into `directory`, creating it if necessary.
    pub fn new(directory: impl Into<PathBuf>) -> AnyResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).with_context(|| {
            format!("failed to create output directory {}", directory.display())
        })?;
        Ok(Self {
            directory,
            written: Vec::new(),
        })
    }

    /// Paths of every file written so far, in write order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Directory images are written into.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write_image(
        &mut self,
        prefix: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> AnyResult<()> {
        let path = self
            .directory
            .join(format!("{prefix}-{:04}.pgm", self.written.len()));
        let mut file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(&encode_pgm(width, height, pixels))
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.written.push(path);
        Ok(())
    }
}

impl RenderHost for PgmHost {
    fn present_stimulus(
        &mut self,
        _placement: PlacementRect,
        pixels: &PixelBuffer,
    ) -> AnyResult<()> {
        self.write_image("stimulus", pixels.size(), pixels.size(), pixels.pixels())
    }

    fn present_frame(&mut self, frame: &Frame) -> AnyResult<()> {
        self.write_image("frame", frame.width(), frame.height(), frame.pixels())
    }
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// The arena rounds to a canvas without pixels.
    EmptyCanvas {
        /// Canvas width that failed validation.
        width: u32,
        /// Canvas height that failed validation.
        height: u32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCanvas { width, height } => {
                write!(f, "canvas must contain pixels (received {width}x{height})")
            }
        }
    }
}

impl Error for RenderingError {}

fn canvas_extent(extent: f64) -> u32 {
    if extent.is_finite() {
        extent.round().clamp(0.0, f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn to_byte(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
