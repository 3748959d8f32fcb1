mod color;

pub use color::parse_color;

use crate::error::{Result, SegmentError};
use image::{Rgba, RgbaImage};
use std::fmt;
use std::str::FromStr;

/// A mask cell is foreground when its logit is strictly above this
pub const FOREGROUND_THRESHOLD: f32 = 0.0;

const HIGHLIGHT_BOOST: f32 = 100.0;
const HIGHLIGHT_DIM: f32 = 0.6;
const BACKGROUND_DIM: f32 = 0.3;
const BACKGROUND_BLUE_LIFT: f32 = 100.0;

/// How the mask is rendered against the source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Keep the subject, paint everything else with the background color
    Cutout,
    /// Warm, opaque subject over a dimmed surrounding
    Highlight,
    /// Subject untouched, surrounding darkened with a cool tint
    Background,
}

impl FromStr for CompositeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cutout" => Ok(CompositeMode::Cutout),
            "highlight" => Ok(CompositeMode::Highlight),
            "background" => Ok(CompositeMode::Background),
            other => Err(format!(
                "unknown mode '{}' (expected cutout, highlight or background)",
                other
            )),
        }
    }
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeMode::Cutout => "cutout",
            CompositeMode::Highlight => "highlight",
            CompositeMode::Background => "background",
        };
        f.write_str(name)
    }
}

/// Nearest-neighbour lookup of the mask cell covering image pixel (x, y)
///
/// Each axis is scaled independently (width / M, height / M), so a
/// non-square image stretches the square mask.
pub fn mask_index(x: u32, y: u32, width: u32, height: u32, mask_size: u32) -> usize {
    let scale_x = width as f64 / mask_size as f64;
    let scale_y = height as f64 / mask_size as f64;
    let last = mask_size.saturating_sub(1);

    let mask_x = ((x as f64 / scale_x).floor() as u32).min(last);
    let mask_y = ((y as f64 / scale_y).floor() as u32).min(last);

    (mask_y * mask_size + mask_x) as usize
}

fn scale(channel: u8, factor: f32) -> u8 {
    (channel as f32 * factor).round().clamp(0.0, 255.0) as u8
}

fn lift(channel: u8, amount: f32) -> u8 {
    (channel as f32 + amount).round().clamp(0.0, 255.0) as u8
}

fn blend(pixel: Rgba<u8>, foreground: bool, mode: CompositeMode, background: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    match (mode, foreground) {
        (CompositeMode::Cutout, true) => pixel,
        (CompositeMode::Cutout, false) => background,
        (CompositeMode::Highlight, true) => Rgba([lift(r, HIGHLIGHT_BOOST), g, b, 255]),
        (CompositeMode::Highlight, false) => Rgba([
            scale(r, HIGHLIGHT_DIM),
            scale(g, HIGHLIGHT_DIM),
            scale(b, HIGHLIGHT_DIM),
            a,
        ]),
        (CompositeMode::Background, true) => pixel,
        (CompositeMode::Background, false) => Rgba([
            scale(r, BACKGROUND_DIM),
            scale(g, BACKGROUND_DIM),
            lift(scale(b, BACKGROUND_DIM), BACKGROUND_BLUE_LIFT),
            a,
        ]),
    }
}

/// Blend `image` with an M x M mask, producing an image of the same size
///
/// `background` is only used by `CompositeMode::Cutout`.
///
/// Returns: a new image at the source resolution, or a `Precondition` error
/// when `mask` holds fewer than M x M cells.
pub fn composite(
    image: &RgbaImage,
    mask: &[f32],
    mask_size: u32,
    mode: CompositeMode,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    let _span = tracing::debug_span!("composite", %mode).entered();

    let cells = mask_size as usize * mask_size as usize;
    if mask_size == 0 || mask.len() < cells {
        return Err(SegmentError::precondition(format!(
            "mask has {} values, expected {}x{}",
            mask.len(),
            mask_size,
            mask_size
        )));
    }

    let (width, height) = image.dimensions();
    let mut output = image.clone();

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        // Nearest mask cell, thresholded at the model's decision boundary
        let cell = mask[mask_index(x, y, width, height, mask_size)];
        *pixel = blend(*pixel, cell > FOREGROUND_THRESHOLD, mode, background);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Left half foreground, right half background
    fn split_mask(size: u32) -> Vec<f32> {
        (0..size * size)
            .map(|i| if i % size < size / 2 { 4.0 } else { -4.0 })
            .collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("cutout".parse::<CompositeMode>(), Ok(CompositeMode::Cutout));
        assert_eq!(" Highlight ".parse::<CompositeMode>(), Ok(CompositeMode::Highlight));
        assert_eq!("background".parse::<CompositeMode>(), Ok(CompositeMode::Background));
        assert!("blur".parse::<CompositeMode>().is_err());
        assert_eq!(CompositeMode::Highlight.to_string(), "highlight");
    }

    #[test]
    fn test_threshold_is_strict() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        let mask = [0.0, 1e-6, 0.0, 1e-6];
        let clear = Rgba([0, 0, 0, 0]);
        let output = composite(&image, &mask, 2, CompositeMode::Cutout, clear).unwrap();

        assert_eq!(*output.get_pixel(0, 0), clear);
        assert_eq!(*output.get_pixel(1, 0), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_cutout_with_transparent_background() {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 200, 255]));
        let output = composite(&image, &split_mask(4), 4, CompositeMode::Cutout, Rgba([0, 0, 0, 0])).unwrap();

        for (x, y, pixel) in output.enumerate_pixels() {
            if x < 4 {
                assert_eq!(pixel, image.get_pixel(x, y));
            } else {
                assert_eq!(*pixel, Rgba([0, 0, 0, 0]));
            }
        }
    }

    #[test]
    fn test_highlight_mode() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 128]));
        let output = composite(&image, &split_mask(2), 2, CompositeMode::Highlight, Rgba([0, 0, 0, 0])).unwrap();

        // foreground: boosted red clamps at 255, full opacity
        assert_eq!(*output.get_pixel(0, 0), Rgba([255, 100, 50, 255]));
        // background: dimmed to 60%, alpha kept
        assert_eq!(*output.get_pixel(3, 3), Rgba([120, 60, 30, 128]));
    }

    #[test]
    fn test_background_mode() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([100, 200, 250, 90]));
        let output = composite(&image, &split_mask(2), 2, CompositeMode::Background, Rgba([1, 2, 3, 4])).unwrap();

        assert_eq!(*output.get_pixel(1, 2), Rgba([100, 200, 250, 90]));
        assert_eq!(*output.get_pixel(2, 1), Rgba([30, 60, 175, 90]));
    }

    #[test]
    fn test_background_blue_clamps() {
        let out = blend(Rgba([0, 0, 255, 255]), false, CompositeMode::Background, Rgba([0, 0, 0, 0]));
        assert_eq!(out, Rgba([0, 0, 177, 255]));
        let lifted = lift(250, 100.0);
        assert_eq!(lifted, 255);
    }

    #[test]
    fn test_output_keeps_image_resolution() {
        let image = RgbaImage::new(1000, 333);
        let mask = vec![1.0; 256 * 256];
        let output = composite(&image, &mask, 256, CompositeMode::Highlight, Rgba([0, 0, 0, 0])).unwrap();
        assert_eq!(output.dimensions(), (1000, 333));
    }

    #[test]
    fn test_mask_index_stretches_each_axis() {
        // 512 wide maps two pixels per cell, 128 tall maps half a pixel per cell
        assert_eq!(mask_index(511, 0, 512, 128, 256), 255);
        assert_eq!(mask_index(2, 0, 512, 128, 256), 1);
        assert_eq!(mask_index(0, 1, 512, 128, 256), 2 * 256);
        assert_eq!(mask_index(0, 127, 512, 128, 256), 254 * 256);
    }

    #[test]
    fn test_composite_is_repeatable() {
        let image = RgbaImage::from_fn(37, 91, |x, y| Rgba([x as u8, y as u8, (x ^ y) as u8, 255]));
        let mask: Vec<f32> = (0..16 * 16).map(|i| (i % 7) as f32 - 3.0).collect();
        let first = composite(&image, &mask, 16, CompositeMode::Background, Rgba([0, 0, 0, 0])).unwrap();
        let second = composite(&image, &mask, 16, CompositeMode::Background, Rgba([0, 0, 0, 0])).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_short_mask_is_rejected() {
        let image = RgbaImage::new(8, 8);
        let err = composite(&image, &[1.0; 15], 4, CompositeMode::Cutout, Rgba([0, 0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, SegmentError::Precondition(_)));
        assert!(composite(&image, &[], 0, CompositeMode::Cutout, Rgba([0, 0, 0, 0])).is_err());
    }

    proptest! {
        #[test]
        fn prop_mask_index_stays_in_bounds(
            width in 1u32..4096,
            height in 1u32..4096,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0,
            mask_size in 1u32..512,
        ) {
            let x = ((width as f64 * fx) as u32).min(width - 1);
            let y = ((height as f64 * fy) as u32).min(height - 1);
            let index = mask_index(x, y, width, height, mask_size);
            prop_assert!(index < (mask_size * mask_size) as usize);
        }

        #[test]
        fn prop_mask_index_corners_in_bounds(
            width in 1u32..3000,
            height in 1u32..3000,
        ) {
            let cells = 256 * 256;
            prop_assert!(mask_index(width - 1, height - 1, width, height, 256) < cells);
            prop_assert_eq!(mask_index(0, 0, width, height, 256), 0);
        }
    }
}
