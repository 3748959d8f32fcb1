use super::types::NormalizedImage;
use crate::error::{Result, SegmentError};
use image::{imageops, DynamicImage, GenericImageView, GrayImage, Rgba, RgbaImage};
use ndarray::Array4;

/// Image handed to the session for embedding
#[derive(Debug, Clone)]
pub enum SourceImage {
    /// Decoded bitmap with intrinsic size; letterboxed onto the model canvas
    Bitmap(DynamicImage),
    /// RGBA buffer already at the model input size; used as-is
    Pixels(RgbaImage),
}

impl SourceImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SourceImage::Bitmap(image) => image.dimensions(),
            SourceImage::Pixels(pixels) => pixels.dimensions(),
        }
    }

    /// Original pixels at native resolution
    pub fn to_rgba(&self) -> RgbaImage {
        match self {
            SourceImage::Bitmap(image) => image.to_rgba8(),
            SourceImage::Pixels(pixels) => pixels.clone(),
        }
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        SourceImage::Bitmap(image)
    }
}

/// Converts source images into the square planar encoder input
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    size: u32,
}

impl Normalizer {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Letterbox and normalize an image into an NCHW tensor
    ///
    /// Steps:
    /// 1. Scale uniformly to fit the square canvas, centered, black borders
    /// 2. Convert to float and normalize to [0, 1], dropping alpha
    /// 3. Lay out channel-first: [1, 3, size, size]
    pub fn normalize(&self, source: &SourceImage) -> Result<NormalizedImage> {
        let _span = tracing::debug_span!("normalize").entered();

        let (canvas, aspect_ratio) = match source {
            SourceImage::Bitmap(image) => {
                let (width, height) = image.dimensions();
                if width == 0 || height == 0 {
                    return Err(SegmentError::InvalidImage(format!(
                        "image has no pixels ({}x{})",
                        width, height
                    )));
                }
                let canvas = self.letterbox(&image.to_rgba8());
                (canvas, width as f32 / height as f32)
            }
            SourceImage::Pixels(pixels) => {
                if pixels.dimensions() != (self.size, self.size) {
                    let (width, height) = pixels.dimensions();
                    return Err(SegmentError::InvalidImage(format!(
                        "pixel buffer is {}x{}, expected {}x{}",
                        width, height, self.size, self.size
                    )));
                }
                (pixels.clone(), 1.0)
            }
        };

        let side = self.size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        // Normalize to [0, 1] and store in NCHW format, alpha dropped
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        Ok(NormalizedImage {
            tensor,
            aspect_ratio,
        })
    }

    /// Fit the image inside the canvas without cropping
    ///
    /// Returns: an opaque `size` x `size` image with the scaled source centered
    /// and black borders on the short axis
    fn letterbox(&self, image: &RgbaImage) -> RgbaImage {
        let (width, height) = image.dimensions();

        // Uniform scale so the long side fills the canvas
        let scale = (self.size as f32 / width as f32).min(self.size as f32 / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, self.size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, self.size);

        let resized = if (scaled_width, scaled_height) != (width, height) {
            imageops::resize(
                image,
                scaled_width,
                scaled_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        // Center on the canvas
        let offset_x = (self.size - scaled_width) / 2;
        let offset_y = (self.size - scaled_height) / 2;
        tracing::debug!(
            "Letterbox {}x{} -> {}x{} at ({}, {})",
            width,
            height,
            scaled_width,
            scaled_height,
            offset_x,
            offset_y
        );

        // Black borders, then paste the scaled image over them
        let mut canvas = RgbaImage::from_pixel(self.size, self.size, Rgba([0, 0, 0, 255]));
        imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);
        canvas
    }
}

/// Render mask logits as a grayscale image (255 where the logit is above zero)
///
/// Fails with `Precondition` when `mask` holds fewer than `size` x `size` cells.
pub fn mask_to_luma(mask: &[f32], size: u32) -> Result<GrayImage> {
    let cells = size as usize * size as usize;
    if mask.len() < cells {
        return Err(SegmentError::precondition(format!(
            "mask has {} values, expected {}x{}",
            mask.len(),
            size,
            size
        )));
    }

    Ok(GrayImage::from_fn(size, size, |x, y| {
        let idx = (y * size + x) as usize;
        let value = if mask[idx] > 0.0 { 255 } else { 0 };
        image::Luma([value])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::types::INPUT_SIZE;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> SourceImage {
        SourceImage::Bitmap(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba(color),
        )))
    }

    #[test]
    fn test_full_size_buffer_is_planar() {
        let normalizer = Normalizer::new(INPUT_SIZE);
        let mut pixels = RgbaImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Rgba([255, 0, 51, 7]));
        pixels.put_pixel(1, 0, Rgba([0, 255, 0, 255]));

        let normalized = normalizer.normalize(&SourceImage::Pixels(pixels)).unwrap();
        let planes = normalized.planes();
        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;

        assert_eq!(planes.len(), 3 * plane);
        assert_eq!(planes[0], 1.0);
        assert_eq!(planes[plane], 0.0);
        assert!((planes[2 * plane] - 0.2).abs() < 1e-6);
        // second pixel of the green plane
        assert_eq!(planes[plane + 1], 1.0);
        assert_eq!(normalized.aspect_ratio(), 1.0);
    }

    #[test]
    fn test_pixel_buffer_must_match_input_size() {
        let normalizer = Normalizer::new(64);
        let pixels = RgbaImage::new(32, 64);
        let err = normalizer.normalize(&SourceImage::Pixels(pixels)).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidImage(_)));
    }

    #[test]
    fn test_wide_image_is_letterboxed_vertically() {
        let normalizer = Normalizer::new(64);
        let normalized = normalizer
            .normalize(&solid(128, 64, [255, 255, 255, 255]))
            .unwrap();
        let tensor = normalized.tensor();

        assert_eq!(normalized.aspect_ratio(), 2.0);
        // 128x64 scales to 64x32, centered with 16 rows of border above and below
        assert_eq!(tensor[[0, 0, 0, 32]], 0.0);
        assert_eq!(tensor[[0, 0, 15, 32]], 0.0);
        assert!(tensor[[0, 0, 16, 32]] > 0.99);
        assert!(tensor[[0, 0, 47, 32]] > 0.99);
        assert_eq!(tensor[[0, 0, 48, 32]], 0.0);
    }

    #[test]
    fn test_tall_image_is_letterboxed_horizontally() {
        let normalizer = Normalizer::new(64);
        let normalized = normalizer
            .normalize(&solid(16, 64, [0, 0, 255, 255]))
            .unwrap();
        let tensor = normalized.tensor();

        assert_eq!(normalized.aspect_ratio(), 0.25);
        assert_eq!(tensor[[0, 2, 32, 0]], 0.0);
        assert_eq!(tensor[[0, 2, 32, 24]], 1.0);
        assert_eq!(tensor[[0, 2, 32, 39]], 1.0);
        assert_eq!(tensor[[0, 2, 32, 40]], 0.0);
    }

    #[test]
    fn test_empty_bitmap_is_rejected() {
        let normalizer = Normalizer::new(64);
        let err = normalizer.normalize(&solid(0, 10, [0, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidImage(_)));
    }

    #[test]
    fn test_mask_to_luma_threshold() {
        let mask = [0.0, 1e-6, -3.0, 8.0];
        let image = mask_to_luma(&mask, 2).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(1, 0)[0], 255);
        assert_eq!(image.get_pixel(0, 1)[0], 0);
        assert_eq!(image.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_mask_to_luma_rejects_short_mask() {
        let err = mask_to_luma(&[1.0, 2.0, 3.0], 2).unwrap_err();
        assert!(matches!(err, SegmentError::Precondition(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_normalize_fills_planes_in_unit_range(
            width in 1u32..96,
            height in 1u32..96,
            seed in any::<u32>(),
        ) {
            let image = RgbaImage::from_fn(width, height, |x, y| {
                let v = seed.wrapping_mul(31).wrapping_add(x * 7 + y * 13);
                Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
            });
            let normalizer = Normalizer::new(48);
            let normalized = normalizer
                .normalize(&SourceImage::Bitmap(DynamicImage::ImageRgba8(image)))
                .unwrap();

            prop_assert_eq!(normalized.planes().len(), 3 * 48 * 48);
            prop_assert!(normalized.planes().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
