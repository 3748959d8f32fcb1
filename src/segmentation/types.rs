use anyhow::Result;
use ndarray::{Array2, Array3, Array4, ArrayD, ArrayViewD};

/// Side of the square encoder input (S)
pub const INPUT_SIZE: u32 = 1024;

/// Side of each decoded low-resolution mask (M)
pub const MASK_SIZE: u32 = 256;

/// Fixed near-full-frame box used as the person heuristic, normalized [x1, y1, x2, y2]
pub const HUMAN_BOX: [f32; 4] = [0.1, 0.1, 0.9, 0.95];

/// Letterboxed encoder input: planar RGB in [0, 1], shape [1, 3, S, S]
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub(crate) tensor: Array4<f32>,
    pub(crate) aspect_ratio: f32,
}

impl NormalizedImage {
    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    /// Plane-major pixel data (all R, then all G, then all B)
    pub fn planes(&self) -> &[f32] {
        self.tensor.as_slice().unwrap_or(&[])
    }

    pub fn size(&self) -> u32 {
        self.tensor.shape()[3] as u32
    }

    /// Width / height of the source before letterboxing, 1.0 when unknown
    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }
}

/// Encoder output, passed through unchanged to every decode call
#[derive(Debug, Clone)]
pub struct Embedding {
    tensor: ArrayD<f32>,
}

impl Embedding {
    pub fn new(tensor: ArrayD<f32>) -> Self {
        Self { tensor }
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.tensor.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }
}

/// Foreground/background label for a point prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    Background,
    Foreground,
}

impl PointLabel {
    pub fn as_f32(self) -> f32 {
        match self {
            PointLabel::Background => 0.0,
            PointLabel::Foreground => 1.0,
        }
    }
}

/// Sparse prompt in normalized [0, 1] image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prompt {
    Point { x: f32, y: f32, label: PointLabel },
    /// [x1, y1, x2, y2]
    Box([f32; 4]),
}

/// Decoder tensors for one single-shot prompt
#[derive(Debug, Clone)]
pub struct DecoderInputs {
    /// [1, 1, 2] in model space
    pub point_coords: Array3<f32>,
    /// [1, 1]
    pub point_labels: Array2<f32>,
    /// [1, 1, M, M] prior mask, zeroed
    pub mask_input: Array4<f32>,
    pub has_mask_input: f32,
    pub orig_im_size: [f32; 2],
    /// [1, 4] in model space
    pub boxes: Array2<f32>,
}

/// Raw decoder output before selection
#[derive(Debug, Clone)]
pub struct DecodedMasks {
    /// N masks of M x M logits, concatenated
    pub masks: Vec<f32>,
    /// One score per mask
    pub scores: Vec<f32>,
}

/// Candidate masks retained from the latest decode, with the selected one
#[derive(Debug, Clone)]
pub struct MaskSet {
    masks: Vec<f32>,
    scores: Vec<f32>,
    size: u32,
    best: usize,
}

impl MaskSet {
    pub(crate) fn new(masks: Vec<f32>, scores: Vec<f32>, size: u32, best: usize) -> Self {
        Self {
            masks,
            scores,
            size,
            best,
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Mask side length (M)
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn best_index(&self) -> usize {
        self.best
    }

    /// Row-major M x M logits of one candidate
    pub fn mask(&self, index: usize) -> Option<&[f32]> {
        let cells = (self.size * self.size) as usize;
        self.masks.get(index * cells..(index + 1) * cells)
    }

    pub fn best(&self) -> &[f32] {
        let cells = (self.size * self.size) as usize;
        &self.masks[self.best * cells..(self.best + 1) * cells]
    }
}

/// Image encoder backend (one call per image)
pub trait ImageEncoder: Send {
    /// Encode a letterboxed image into an embedding
    fn encode(&mut self, image: &NormalizedImage) -> Result<Embedding>;
}

/// Prompt decoder backend
pub trait MaskDecoder: Send {
    /// Decode candidate masks for one prompt against an embedding
    fn decode(&mut self, embedding: &Embedding, inputs: &DecoderInputs) -> Result<DecodedMasks>;
}

/// Builds the two inference contexts
///
/// Loading is split so progress can be reported between the two models.
pub trait ModelLoader: Send + Sync {
    fn load_encoder(&self) -> Result<Box<dyn ImageEncoder>>;

    fn load_decoder(&self) -> Result<Box<dyn MaskDecoder>>;
}
