mod encode;

pub use encode::{encode_data_url, encode_png, DataUrlSink, PngFileSink};

use anyhow::Result;
use image::RgbaImage;

/// Trait for composited image destinations
pub trait OutputSink {
    /// Write one finished image
    fn write_image(&mut self, image: &RgbaImage) -> Result<()>;
}
