mod sources;

pub use sources::{DataUrlSource, FileSource};

use anyhow::Result;
use image::DynamicImage;

/// Trait for bitmap sources (uploaded files, captured frames)
pub trait ImageSource {
    /// Decode the source into a bitmap with intrinsic width/height
    fn load(&mut self) -> Result<DynamicImage>;
}
