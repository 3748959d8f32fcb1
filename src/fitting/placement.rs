use image::{imageops, Rgba, RgbaImage};

/// Where an accessory lands on the base image
///
/// `x`/`y` are the centre in base pixels, `rotation` is counter-clockwise in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

/// Body region used when no landmarks are available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Head,
    Face,
    Neck,
    Torso,
    Wrist,
    Center,
}

impl Region {
    /// Proportional placement of the region on a `width` x `height` image
    pub fn placement(self, width: u32, height: u32) -> Placement {
        let w = width as f32;
        let h = height as f32;
        let mid_x = (width / 2) as f32;

        let (x, y, pw, ph) = match self {
            Region::Head => (mid_x, h * 0.15, w * 0.5, h * 0.2),
            Region::Face => (mid_x, h * 0.25, w * 0.4, h * 0.1),
            Region::Neck => (mid_x, h * 0.35, w * 0.3, h * 0.1),
            Region::Torso => (mid_x, h * 0.5, w * 0.7, h * 0.4),
            Region::Wrist => (w * 0.7, h * 0.6, w * 0.15, w * 0.15),
            Region::Center => (mid_x, (height / 2) as f32, w * 0.5, h * 0.3),
        };

        Placement {
            x,
            y,
            width: pw,
            height: ph,
            rotation: 0.0,
        }
    }
}

/// Rotate counter-clockwise about the centre, keeping the canvas size
///
/// Nearest-neighbour inverse mapping; uncovered pixels are transparent.
fn rotate_about_center(image: &RgbaImage, degrees: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;

    RgbaImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = (cos * dx - sin * dy + cx).round();
        let sy = (sin * dx + cos * dy + cy).round();

        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < width && (sy as u32) < height {
            *image.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Resize, rotate and alpha-blend `accessory` onto a copy of `base`
///
/// # Arguments
/// * `base` - Try-on image, left untouched
/// * `accessory` - RGBA art; its alpha drives the blend
/// * `placement` - Centre, size and rotation in base pixels
///
/// The accessory is pushed back inside the canvas when it would overhang an
/// edge. Only RGB is blended; the base alpha is kept.
pub fn place_accessory(base: &RgbaImage, accessory: &RgbaImage, placement: &Placement) -> RgbaImage {
    let _span = tracing::debug_span!("place_accessory").entered();

    let mut result = base.clone();
    let target_width = placement.width.max(0.0) as u32;
    let target_height = placement.height.max(0.0) as u32;
    if target_width == 0 || target_height == 0 || accessory.width() == 0 || accessory.height() == 0 {
        tracing::debug!("Skipping empty accessory placement {:?}", placement);
        return result;
    }

    // Resize to the target box, then rotate in place
    let mut resized = imageops::resize(
        accessory,
        target_width,
        target_height,
        imageops::FilterType::Triangle,
    );
    if placement.rotation != 0.0 {
        resized = rotate_about_center(&resized, placement.rotation);
    }

    let (base_width, base_height) = base.dimensions();
    let (acc_width, acc_height) = resized.dimensions();

    // Top-left corner from the centre, clamped into the canvas
    let mut offset_x = (placement.x - (placement.width / 2.0).floor()) as i64;
    let mut offset_y = (placement.y - (placement.height / 2.0).floor()) as i64;
    offset_x = offset_x.min(base_width as i64 - acc_width as i64).max(0);
    offset_y = offset_y.min(base_height as i64 - acc_height as i64).max(0);

    let (offset_x, offset_y) = (offset_x as u32, offset_y as u32);
    let roi_width = acc_width.min(base_width.saturating_sub(offset_x));
    let roi_height = acc_height.min(base_height.saturating_sub(offset_y));

    // Alpha blend over the visible region
    for y in 0..roi_height {
        for x in 0..roi_width {
            let overlay = resized.get_pixel(x, y);
            let alpha = overlay[3] as f32 / 255.0;
            let pixel = result.get_pixel_mut(offset_x + x, offset_y + y);
            for c in 0..3 {
                let blended = (1.0 - alpha) * pixel[c] as f32 + alpha * overlay[c] as f32;
                pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    result
}

/// Semi-transparent purple card with a white border, for missing accessory art
pub fn placeholder_accessory(width: u32, height: u32) -> RgbaImage {
    const MARGIN: u32 = 10;
    let fill = Rgba([255, 0, 255, 128]);
    let border = Rgba([255, 255, 255, 200]);

    RgbaImage::from_fn(width, height, |x, y| {
        let right = width.saturating_sub(MARGIN);
        let bottom = height.saturating_sub(MARGIN);
        if x < MARGIN || y < MARGIN || x > right || y > bottom {
            return Rgba([0, 0, 0, 0]);
        }
        let on_edge = x <= MARGIN + 1 || y <= MARGIN + 1 || x + 1 >= right || y + 1 >= bottom;
        if on_edge {
            border
        } else {
            fill
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_proportions() {
        let torso = Region::Torso.placement(200, 100);
        assert_eq!(torso, Placement { x: 100.0, y: 50.0, width: 140.0, height: 40.0, rotation: 0.0 });

        let wrist = Region::Wrist.placement(200, 100);
        assert!((wrist.width - 30.0).abs() < 1e-4);
        assert_eq!(wrist.width, wrist.height);
        assert!((wrist.x - 140.0).abs() < 1e-4);

        let center = Region::Center.placement(101, 51);
        assert_eq!((center.x, center.y), (50.0, 25.0));
    }

    #[test]
    fn test_opaque_accessory_replaces_rgb_only() {
        let base = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 77]));
        let accessory = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]));
        let placement = Placement { x: 5.0, y: 5.0, width: 4.0, height: 4.0, rotation: 0.0 };

        let result = place_accessory(&base, &accessory, &placement);
        assert_eq!(*result.get_pixel(3, 3), Rgba([200, 100, 50, 77]));
        assert_eq!(*result.get_pixel(6, 6), Rgba([200, 100, 50, 77]));
        assert_eq!(*result.get_pixel(2, 2), Rgba([0, 0, 0, 77]));
        assert_eq!(*result.get_pixel(7, 7), Rgba([0, 0, 0, 77]));
    }

    #[test]
    fn test_half_transparent_accessory_blends() {
        let base = RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255]));
        let accessory = RgbaImage::from_pixel(4, 4, Rgba([200, 0, 100, 51]));
        let placement = Placement { x: 2.0, y: 2.0, width: 4.0, height: 4.0, rotation: 0.0 };

        let result = place_accessory(&base, &accessory, &placement);
        // alpha 0.2: 0.8 * 100 + 0.2 * overlay
        assert_eq!(*result.get_pixel(1, 1), Rgba([120, 80, 100, 255]));
    }

    #[test]
    fn test_overhanging_accessory_is_pulled_inside() {
        let base = RgbaImage::new(10, 10);
        let accessory = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let placement = Placement { x: 10.0, y: -3.0, width: 4.0, height: 4.0, rotation: 0.0 };

        let result = place_accessory(&base, &accessory, &placement);
        assert_eq!(result.get_pixel(9, 0)[0], 255);
        assert_eq!(result.get_pixel(6, 3)[0], 255);
        assert_eq!(result.get_pixel(5, 0)[0], 0);
        assert_eq!(result.get_pixel(9, 4)[0], 0);
    }

    #[test]
    fn test_oversized_accessory_is_cropped() {
        let base = RgbaImage::new(4, 4);
        let accessory = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let placement = Placement { x: 2.0, y: 2.0, width: 8.0, height: 8.0, rotation: 0.0 };

        let result = place_accessory(&base, &accessory, &placement);
        assert_eq!(result.dimensions(), (4, 4));
        assert!(result.pixels().all(|p| p[0] == 9));
    }

    #[test]
    fn test_zero_size_placement_is_noop() {
        let base = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4]));
        let accessory = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        let placement = Placement { x: 2.0, y: 2.0, width: 0.0, height: 3.0, rotation: 0.0 };
        assert_eq!(place_accessory(&base, &accessory, &placement), base);
    }

    #[test]
    fn test_rotation_by_quarter_turn() {
        // a single marked pixel right of centre moves above it
        let mut image = RgbaImage::new(5, 5);
        image.put_pixel(4, 2, Rgba([255, 0, 0, 255]));
        let rotated = rotate_about_center(&image, 90.0);

        assert_eq!(*rotated.get_pixel(2, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(rotated.get_pixel(4, 2)[3], 0);
    }

    #[test]
    fn test_placeholder_layout() {
        let card = placeholder_accessory(100, 100);
        assert_eq!(card.get_pixel(5, 5)[3], 0);
        assert_eq!(*card.get_pixel(10, 50), Rgba([255, 255, 255, 200]));
        assert_eq!(*card.get_pixel(50, 50), Rgba([255, 0, 255, 128]));
        assert_eq!(card.get_pixel(95, 50)[3], 0);
    }
}
