use super::OutputSink;
use crate::error::{Result as SegmentResult, SegmentError};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an image as PNG bytes
pub fn encode_png(image: &RgbaImage) -> SegmentResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| SegmentError::Export(e.to_string()))?;
    Ok(bytes.into_inner())
}

/// Encode an image as a `data:image/png;base64,...` string for storage or download
pub fn encode_data_url(image: &RgbaImage) -> SegmentResult<String> {
    let png = encode_png(image)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(png)))
}

/// Writes each image to a PNG file, replacing it
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OutputSink for PngFileSink {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        let (width, height) = image.dimensions();
        tracing::info!("Writing {}x{} PNG to {}", width, height, self.path.display());

        let png = encode_png(image)?;
        std::fs::write(&self.path, png)
            .with_context(|| format!("Failed to write image to {}", self.path.display()))?;
        Ok(())
    }
}

/// Keeps the latest image as a PNG data URL
#[derive(Default)]
pub struct DataUrlSink {
    latest: Option<String>,
}

impl DataUrlSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }
}

impl OutputSink for DataUrlSink {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        let url = encode_data_url(image).context("Failed to encode data URL")?;
        tracing::debug!("Encoded data URL ({} bytes)", url.len());
        self.latest = Some(url);
        Ok(())
    }
}
