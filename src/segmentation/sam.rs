use super::types::{
    DecodedMasks, DecoderInputs, Embedding, ImageEncoder, MaskDecoder, ModelLoader,
    NormalizedImage,
};
use crate::config::{Provider, SessionConfig};
use anyhow::{Context, Result};
use ndarray::array;
use ort::ep::CUDA;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, TensorRef};
use std::path::Path;

/// Build one ONNX Runtime session
///
/// With `Provider::Cuda` the CUDA execution provider is registered first;
/// ONNX Runtime falls back to CPU when it is unavailable.
fn build_session(path: &Path, provider: Provider, intra_threads: usize) -> Result<Session> {
    tracing::info!("Loading model from {} ({:?})", path.display(), provider);

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort::Error::<()>::from)?
        .with_intra_threads(intra_threads)
        .map_err(ort::Error::<()>::from)?;

    if provider == Provider::Cuda {
        builder = builder
            .with_execution_providers([CUDA::default().build()])
            .map_err(ort::Error::<()>::from)?;
    }

    let session = builder
        .commit_from_file(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))?;

    tracing::debug!(
        "Model inputs: {:?}",
        session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>()
    );

    Ok(session)
}

/// SAM image encoder: [1, 3, S, S] planar RGB -> embedding
pub struct SamEncoder {
    session: Session,
}

impl SamEncoder {
    pub fn new<P: AsRef<Path>>(model_path: P, provider: Provider, intra_threads: usize) -> Result<Self> {
        let session = build_session(model_path.as_ref(), provider, intra_threads)?;
        tracing::info!("Encoder loaded successfully");
        Ok(Self { session })
    }
}

impl ImageEncoder for SamEncoder {
    fn encode(&mut self, image: &NormalizedImage) -> Result<Embedding> {
        let _span = tracing::debug_span!("sam_encode").entered();

        let input = Tensor::from_array(image.tensor().clone())?;
        let outputs = self
            .session
            .run(ort::inputs!["image" => input])
            .context("Failed to run image encoder")?;

        // Single output: the embedding, passed through opaque
        let embedding = outputs[0]
            .try_extract_array::<f32>()
            .context("Encoder output is not a float tensor")?
            .to_owned();

        tracing::debug!("Embedding shape: {:?}", embedding.shape());
        Ok(Embedding::new(embedding))
    }
}

/// SAM prompt decoder: embedding + sparse prompt -> N candidate masks
///
/// Input names follow the SAM ONNX export: `image_embeddings`,
/// `point_coords`, `point_labels`, `mask_input`, `has_mask_input`,
/// `orig_im_size` and `onnx_box`.
pub struct SamDecoder {
    session: Session,
}

impl SamDecoder {
    pub fn new<P: AsRef<Path>>(model_path: P, provider: Provider, intra_threads: usize) -> Result<Self> {
        let session = build_session(model_path.as_ref(), provider, intra_threads)?;
        tracing::info!("Decoder loaded successfully");
        Ok(Self { session })
    }
}

impl MaskDecoder for SamDecoder {
    fn decode(&mut self, embedding: &Embedding, inputs: &DecoderInputs) -> Result<DecodedMasks> {
        let _span = tracing::debug_span!("sam_decode").entered();

        // Embedding is borrowed, prompt tensors are small enough to copy
        let outputs = self
            .session
            .run(ort::inputs![
                "image_embeddings" => TensorRef::from_array_view(embedding.view())?,
                "point_coords" => Tensor::from_array(inputs.point_coords.clone())?,
                "point_labels" => Tensor::from_array(inputs.point_labels.clone())?,
                "mask_input" => Tensor::from_array(inputs.mask_input.clone())?,
                "has_mask_input" => Tensor::from_array(array![inputs.has_mask_input])?,
                "orig_im_size" => Tensor::from_array(array![inputs.orig_im_size[0], inputs.orig_im_size[1]])?,
                "onnx_box" => Tensor::from_array(inputs.boxes.clone())?,
            ])
            .context("Failed to run mask decoder")?;

        // Masks arrive as N * M * M values, one score per mask
        let masks: Vec<f32> = outputs["masks"]
            .try_extract_array::<f32>()
            .context("Missing masks output")?
            .iter()
            .copied()
            .collect();
        let scores: Vec<f32> = outputs["iou_predictions"]
            .try_extract_array::<f32>()
            .context("Missing iou_predictions output")?
            .iter()
            .copied()
            .collect();

        tracing::debug!("Decoded {} masks ({} values)", scores.len(), masks.len());
        Ok(DecodedMasks { masks, scores })
    }
}

/// Loads the encoder/decoder pair described by a `SessionConfig`
pub struct OnnxModelLoader {
    config: SessionConfig,
}

impl OnnxModelLoader {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load_encoder(&self) -> Result<Box<dyn ImageEncoder>> {
        let encoder = SamEncoder::new(
            &self.config.encoder_model,
            self.config.provider,
            self.config.intra_threads,
        )?;
        Ok(Box::new(encoder))
    }

    fn load_decoder(&self) -> Result<Box<dyn MaskDecoder>> {
        let decoder = SamDecoder::new(
            &self.config.decoder_model,
            self.config.provider,
            self.config.intra_threads,
        )?;
        Ok(Box::new(decoder))
    }
}
