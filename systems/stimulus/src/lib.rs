#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure Gabor patch synthesis.
//!
//! [`render`] turns a [`StimulusParameters`] snapshot into a square,
//! luminance-only [`PixelBuffer`]: a cosine carrier confined by a Gaussian
//! envelope and modulated around the background's perceptual luminance.
//! Numeric parameters outside their safe ranges are clamped rather than
//! rejected so that every call yields a detectable pattern; only a zero size
//! or a non-finite parameter is reported as a [`ConfigurationError`].

use std::f64::consts::TAU;

use gabor_hunt_core::{ConfigurationError, PixelBuffer, Rgb, StimulusParameters};

/// Darkest luminance ever emitted.
pub const MIN_LUMINANCE: u8 = 4;
/// Brightest luminance ever emitted.
pub const MAX_LUMINANCE: u8 = 251;
/// Contrast floor applied at render time.
pub const MIN_RENDER_CONTRAST: f64 = 0.05;
/// Shortest admissible carrier wavelength in pixels.
pub const MIN_WAVELENGTH: f64 = 3.0;
/// Smallest admissible envelope radius in pixels.
pub const MIN_SIGMA: f64 = 4.0;

const FEWEST_QUANTIZATION_LEVELS: u8 = 4;
const MOST_QUANTIZATION_LEVELS: u8 = 8;

/// Renders the stimulus described by `parameters`.
pub fn render(parameters: &StimulusParameters) -> Result<PixelBuffer, ConfigurationError> {
    validate(parameters)?;

    let size = parameters.size;
    let side = usize::try_from(size).map_err(|_| ConfigurationError::InvalidPatchSize {
        size,
        minimum: 1,
    })?;

    let mean = (perceptual_luminance(parameters.background) * parameters.brightness)
        .clamp(0.0, 255.0);
    let wavelength = clamp_wavelength(parameters.wavelength, size);
    let sigma = clamp_sigma(parameters.sigma, size);
    let contrast = render_contrast(parameters.contrast);
    let (sin, cos) = parameters.orientation.sin_cos();
    let two_sigma_sq = 2.0 * sigma * sigma;
    let center = (f64::from(size) - 1.0) / 2.0;

    let mut pixels = Vec::with_capacity(side * side);
    for row in 0..side {
        let dy = row as f64 - center;
        for column in 0..side {
            let dx = column as f64 - center;
            let rotated = dx * cos + dy * sin;
            let envelope = (-(dx * dx + dy * dy) / two_sigma_sq).exp();
            let carrier = (TAU * rotated / wavelength + parameters.phase).cos();
            let luminance = (mean * (1.0 + contrast * envelope * carrier)).round();
            pixels.push(clamp_luminance(luminance));
        }
    }

    if let Some(levels) = normalize_quantization(parameters.quantization_levels) {
        for pixel in &mut pixels {
            *pixel = quantize(*pixel, levels);
        }
        pixels = smooth(&pixels, side);
    }

    PixelBuffer::from_luminance(size, pixels).ok_or(ConfigurationError::InvalidPatchSize {
        size,
        minimum: 1,
    })
}

/// Clamps a requested wavelength to `[3, floor(size / 4)]`.
#[must_use]
pub fn clamp_wavelength(wavelength: f64, size: u32) -> f64 {
    let upper = f64::from(size / 4).max(MIN_WAVELENGTH);
    wavelength.clamp(MIN_WAVELENGTH, upper)
}

/// Clamps a requested envelope radius to `[max(4, floor(size * 0.12)), floor(size * 0.5)]`.
#[must_use]
pub fn clamp_sigma(sigma: f64, size: u32) -> f64 {
    let size = f64::from(size);
    let lower = (size * 0.12).floor().max(MIN_SIGMA);
    let upper = (size * 0.5).floor().max(lower);
    sigma.clamp(lower, upper)
}

/// Contrast actually used for synthesis; never below [`MIN_RENDER_CONTRAST`].
#[must_use]
pub fn render_contrast(contrast: f64) -> f64 {
    contrast.max(MIN_RENDER_CONTRAST)
}

/// Rec. 709 relative luminance of an sRGB byte triple, on the 0..=255 scale.
#[must_use]
pub fn perceptual_luminance(color: Rgb) -> f64 {
    0.2126 * f64::from(color.red())
        + 0.7152 * f64::from(color.green())
        + 0.0722 * f64::from(color.blue())
}

/// Maps a requested level count onto the supported set; `None` means continuous.
#[must_use]
pub fn normalize_quantization(levels: u8) -> Option<u8> {
    match levels {
        0 => None,
        requested => Some(requested.clamp(FEWEST_QUANTIZATION_LEVELS, MOST_QUANTIZATION_LEVELS)),
    }
}

fn validate(parameters: &StimulusParameters) -> Result<(), ConfigurationError> {
    if parameters.size < 1 {
        return Err(ConfigurationError::InvalidPatchSize {
            size: parameters.size,
            minimum: 1,
        });
    }

    let fields = [
        ("wavelength", parameters.wavelength),
        ("orientation", parameters.orientation),
        ("phase", parameters.phase),
        ("sigma", parameters.sigma),
        ("contrast", parameters.contrast),
        ("brightness", parameters.brightness),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(ConfigurationError::NonFiniteParameter { name, value });
        }
    }
    Ok(())
}

fn clamp_luminance(value: f64) -> u8 {
    value.clamp(f64::from(MIN_LUMINANCE), f64::from(MAX_LUMINANCE)) as u8
}

fn quantize(value: u8, levels: u8) -> u8 {
    let floor = f64::from(MIN_LUMINANCE);
    let step = (f64::from(MAX_LUMINANCE) - floor) / f64::from(levels - 1);
    let index = ((f64::from(value) - floor) / step).round();
    clamp_luminance(floor + index * step)
}

fn smooth(pixels: &[u8], side: usize) -> Vec<u8> {
    let mut smoothed = Vec::with_capacity(pixels.len());
    for row in 0..side {
        for column in 0..side {
            let mut sum = 0u32;
            let mut count = 0u32;
            for neighbour_row in row.saturating_sub(1)..=(row + 1).min(side - 1) {
                for neighbour_column in column.saturating_sub(1)..=(column + 1).min(side - 1) {
                    sum += u32::from(pixels[neighbour_row * side + neighbour_column]);
                    count += 1;
                }
            }
            smoothed.push(clamp_luminance((f64::from(sum) / f64::from(count)).round()));
        }
    }
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_snaps_to_evenly_spaced_levels() {
        let mut seen: Vec<u8> = (0..=255u8).map(|value| quantize(value, 4)).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.first(), Some(&MIN_LUMINANCE));
        assert_eq!(seen.last(), Some(&MAX_LUMINANCE));
    }

    #[test]
    fn smoothing_averages_in_bounds_neighbourhood() {
        let pixels = vec![
            0, 0, 0, //
            0, 90, 0, //
            0, 0, 0,
        ];
        let smoothed = smooth(&pixels, 3);
        assert_eq!(smoothed[4], 10);
        assert_eq!(smoothed[0], 23);
    }

    #[test]
    fn quantization_requests_are_normalized() {
        assert_eq!(normalize_quantization(0), None);
        assert_eq!(normalize_quantization(2), Some(4));
        assert_eq!(normalize_quantization(6), Some(6));
        assert_eq!(normalize_quantization(12), Some(8));
    }

    #[test]
    fn mid_grey_has_matching_perceptual_luminance() {
        let luminance = perceptual_luminance(Rgb::new(128, 128, 128));
        assert!((luminance - 128.0).abs() < 1e-9);
    }
}
