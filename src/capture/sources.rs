use super::ImageSource;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};

/// Image file on disk (png, jpeg, webp, ...)
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileSource {
    fn load(&mut self) -> Result<DynamicImage> {
        let image = image::open(&self.path)
            .with_context(|| format!("Failed to decode image {}", self.path.display()))?;

        let (width, height) = image.dimensions();
        tracing::info!("Loaded {} ({}x{})", self.path.display(), width, height);
        Ok(image)
    }
}

/// Base64 image payload, with or without a `data:image/...;base64,` prefix
pub struct DataUrlSource {
    data: String,
}

impl DataUrlSource {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    fn payload(&self) -> &str {
        let data = self.data.trim();
        if data.starts_with("data:") {
            data.split_once(',').map(|(_, payload)| payload).unwrap_or("")
        } else {
            data
        }
    }
}

impl ImageSource for DataUrlSource {
    fn load(&mut self) -> Result<DynamicImage> {
        let bytes = STANDARD
            .decode(self.payload())
            .context("Image payload is not valid base64")?;
        let image = image::load_from_memory(&bytes).context("Failed to decode image payload")?;

        let (width, height) = image.dimensions();
        tracing::debug!("Decoded {}x{} image from data URL", width, height);
        Ok(image)
    }
}
