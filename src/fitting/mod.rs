//! Accessory overlay for try-on previews

mod placement;

pub use placement::{place_accessory, placeholder_accessory, Placement, Region};

use image::RgbaImage;
use std::fmt;

/// Side of the placeholder card drawn when accessory art is missing
const PLACEHOLDER_SIZE: u32 = 100;

/// Accessory category; decides the default body region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessoryKind {
    Clothing,
    Jewelry,
    Glasses,
    Hats,
    Watches,
    Other,
}

impl AccessoryKind {
    /// Parse a category name, falling back to `Other` for unknown names
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "clothing" => AccessoryKind::Clothing,
            "jewelry" | "jewellery" => AccessoryKind::Jewelry,
            "glasses" => AccessoryKind::Glasses,
            "hats" | "hat" => AccessoryKind::Hats,
            "watches" | "watch" => AccessoryKind::Watches,
            "other" => AccessoryKind::Other,
            unknown => {
                tracing::warn!("Unknown accessory category: {}, using other", unknown);
                AccessoryKind::Other
            }
        }
    }

    pub fn region(self) -> Region {
        match self {
            AccessoryKind::Clothing => Region::Torso,
            AccessoryKind::Jewelry => Region::Neck,
            AccessoryKind::Glasses => Region::Face,
            AccessoryKind::Hats => Region::Head,
            AccessoryKind::Watches => Region::Wrist,
            AccessoryKind::Other => Region::Center,
        }
    }
}

impl fmt::Display for AccessoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessoryKind::Clothing => "clothing",
            AccessoryKind::Jewelry => "jewelry",
            AccessoryKind::Glasses => "glasses",
            AccessoryKind::Hats => "hats",
            AccessoryKind::Watches => "watches",
            AccessoryKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Default placement of an accessory kind on a `width` x `height` image
pub fn default_placement(kind: AccessoryKind, width: u32, height: u32) -> Placement {
    kind.region().placement(width, height)
}

/// Overlay an accessory on a try-on image
///
/// Without accessory art a placeholder card is used; without an explicit
/// placement the kind's default region is used.
pub fn apply_accessory(
    base: &RgbaImage,
    accessory: Option<&RgbaImage>,
    kind: AccessoryKind,
    placement: Option<Placement>,
) -> RgbaImage {
    let (width, height) = base.dimensions();
    let placement = placement.unwrap_or_else(|| default_placement(kind, width, height));
    tracing::info!("Applying {} accessory at {:?}", kind, placement);

    match accessory {
        Some(accessory) => place_accessory(base, accessory, &placement),
        None => {
            let placeholder = placeholder_accessory(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE);
            place_accessory(base, &placeholder, &placement)
        }
    }
}
