mod preprocess;
mod prompt;
mod sam;
mod session;
pub mod types;

pub use preprocess::{mask_to_luma, Normalizer, SourceImage};
pub use prompt::{decoder_inputs, select_best};
pub use sam::{OnnxModelLoader, SamDecoder, SamEncoder};
pub use session::{ModelSession, SegmentationSession, SessionStatus};
pub use types::{
    DecodedMasks, DecoderInputs, Embedding, ImageEncoder, MaskDecoder, MaskSet, ModelLoader,
    NormalizedImage, PointLabel, Prompt, HUMAN_BOX, INPUT_SIZE, MASK_SIZE,
};

use crate::config::SessionConfig;
use std::sync::Arc;

/// Create a session backed by the ONNX encoder/decoder pair in `config`
pub fn create_default_session(config: SessionConfig) -> SegmentationSession {
    SegmentationSession::new(Arc::new(OnnxModelLoader::new(config)))
}
