use thiserror::Error;

/// Errors surfaced by the segmentation session and its collaborators
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Another `initialize` is already in flight
    #[error("Models are still loading")]
    Loading,

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl SegmentError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Keep the whole context chain of a backend failure
    pub(crate) fn inference(err: anyhow::Error) -> Self {
        Self::Inference(format!("{:#}", err))
    }

    pub(crate) fn model_load(err: anyhow::Error) -> Self {
        Self::ModelLoad(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;
