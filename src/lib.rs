//! Person segmentation and compositing for virtual try-on previews
//!
//! A [`SegmentationSession`] embeds a photo once with a SAM-style encoder,
//! turns point or box prompts into masks with the decoder, and composites the
//! selected mask against the original pixels. Accessories can then be laid
//! over the result with [`fitting::apply_accessory`].

pub mod capture;
pub mod compose;
pub mod config;
pub mod error;
pub mod fitting;
pub mod output;
pub mod segmentation;

pub use compose::{composite, parse_color, CompositeMode};
pub use config::{Provider, SessionConfig};
pub use error::{Result, SegmentError};
pub use segmentation::{
    create_default_session, MaskSet, PointLabel, Prompt, SegmentationSession, SessionStatus,
    SourceImage,
};
