use super::preprocess::{mask_to_luma, Normalizer, SourceImage};
use super::prompt::{decoder_inputs, into_mask_set};
use super::types::{
    Embedding, ImageEncoder, MaskDecoder, MaskSet, ModelLoader, NormalizedImage, PointLabel,
    Prompt, HUMAN_BOX, INPUT_SIZE, MASK_SIZE,
};
use crate::compose::{self, CompositeMode};
use crate::error::{Result, SegmentError};
use anyhow::Context;
use image::{GrayImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

type ProgressHook = Arc<dyn Fn(u8) + Send + Sync>;
type StatusHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Model lifecycle as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Ready,
}

/// The two loaded inference contexts
pub struct ModelSession {
    encoder: Mutex<Box<dyn ImageEncoder>>,
    decoder: Mutex<Box<dyn MaskDecoder>>,
}

enum Lifecycle {
    Uninitialized,
    Loading,
    Ready(Arc<ModelSession>),
}

struct LifecycleSlot {
    state: Lifecycle,
    // bumped by dispose so loads and inferences started before it are discarded
    generation: u64,
}

/// Single-slot derived state, replaced wholesale on every embed/decode
#[derive(Default)]
struct SessionState {
    image: Option<Arc<NormalizedImage>>,
    source: Option<Arc<RgbaImage>>,
    embedding: Option<Arc<Embedding>>,
    masks: Option<Arc<MaskSet>>,
}

/// Owns the encoder/decoder pair and the current image, embedding and masks
///
/// Operations are meant to be issued by one logical caller at a time. Each
/// slot holds only the latest value; a decode reflects the most recent
/// completed embed, a composite the most recent completed decode.
pub struct SegmentationSession {
    loader: Arc<dyn ModelLoader>,
    normalizer: Normalizer,
    lifecycle: Mutex<LifecycleSlot>,
    state: Mutex<SessionState>,
    progress: AtomicU8,
    on_progress: Mutex<Option<ProgressHook>>,
    on_status: Mutex<Option<StatusHook>>,
}

/// Puts a `Loading` lifecycle back to `Uninitialized` if `initialize` is dropped mid-load
///
/// Disarmed as soon as the load finishes. A dispose in between owns the
/// lifecycle, so the guard leaves newer generations alone.
struct LoadingGuard<'a> {
    lifecycle: &'a Mutex<LifecycleSlot>,
    generation: u64,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.lifecycle.lock();
        if slot.generation == self.generation && matches!(slot.state, Lifecycle::Loading) {
            slot.state = Lifecycle::Uninitialized;
            drop(slot);
            tracing::warn!("Initialize was cancelled while loading, models left unloaded");
        }
    }
}

/// Run model work off the async executor
async fn run_blocking<T, F>(work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Model task did not complete")?
}

impl SegmentationSession {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            normalizer: Normalizer::new(INPUT_SIZE),
            lifecycle: Mutex::new(LifecycleSlot {
                state: Lifecycle::Uninitialized,
                generation: 0,
            }),
            state: Mutex::new(SessionState::default()),
            progress: AtomicU8::new(0),
            on_progress: Mutex::new(None),
            on_status: Mutex::new(None),
        }
    }

    /// Replace the progress subscriber (0-100)
    pub fn set_progress_hook(&self, hook: impl Fn(u8) + Send + Sync + 'static) {
        *self.on_progress.lock() = Some(Arc::new(hook));
    }

    /// Replace the status-text subscriber
    pub fn set_status_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_status.lock() = Some(Arc::new(hook));
    }

    pub fn status(&self) -> SessionStatus {
        match self.lifecycle.lock().state {
            Lifecycle::Uninitialized => SessionStatus::Uninitialized,
            Lifecycle::Loading => SessionStatus::Loading,
            Lifecycle::Ready(_) => SessionStatus::Ready,
        }
    }

    /// Last reported progress value
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    fn report(&self, progress: u8, status: &str) {
        self.progress.store(progress, Ordering::SeqCst);
        tracing::debug!("[{:>3}%] {}", progress, status);

        let on_progress = self.on_progress.lock().clone();
        if let Some(hook) = on_progress {
            hook(progress);
        }
        self.notify_status(status);
    }

    fn notify_status(&self, status: &str) {
        let on_status = self.on_status.lock().clone();
        if let Some(hook) = on_status {
            hook(status);
        }
    }

    fn models(&self) -> Option<(Arc<ModelSession>, u64)> {
        let slot = self.lifecycle.lock();
        match &slot.state {
            Lifecycle::Ready(models) => Some((Arc::clone(models), slot.generation)),
            _ => None,
        }
    }

    /// Load both inference contexts
    ///
    /// Returns immediately when already ready, and fails with
    /// `SegmentError::Loading` when another load is in flight.
    pub async fn initialize(&self) -> Result<()> {
        let generation = {
            let mut slot = self.lifecycle.lock();
            match slot.state {
                Lifecycle::Ready(_) => return Ok(()),
                Lifecycle::Loading => {
                    tracing::warn!("Initialize requested while models are loading");
                    return Err(SegmentError::Loading);
                }
                Lifecycle::Uninitialized => slot.state = Lifecycle::Loading,
            }
            slot.generation
        };
        let mut guard = LoadingGuard {
            lifecycle: &self.lifecycle,
            generation,
            armed: true,
        };

        let loaded = self.load_models().await;
        guard.disarm();

        let mut slot = self.lifecycle.lock();
        if slot.generation != generation {
            drop(slot);
            tracing::info!("Session disposed while loading, discarding models");
            return Err(SegmentError::ModelLoad(
                "session was disposed while loading".to_string(),
            ));
        }

        match loaded {
            Ok(models) => {
                slot.state = Lifecycle::Ready(Arc::new(models));
                drop(slot);
                tracing::info!("Segmentation models ready");
                self.report(100, "Models ready");
                Ok(())
            }
            Err(err) => {
                slot.state = Lifecycle::Uninitialized;
                drop(slot);
                tracing::error!("Model loading failed: {}", err);
                self.notify_status("Model loading failed");
                Err(err)
            }
        }
    }

    async fn load_models(&self) -> Result<ModelSession> {
        self.report(0, "Initializing segmentation models");

        self.report(20, "Loading image encoder");
        let loader = Arc::clone(&self.loader);
        let encoder = run_blocking(move || loader.load_encoder())
            .await
            .map_err(SegmentError::model_load)?;

        self.report(60, "Loading mask decoder");
        let loader = Arc::clone(&self.loader);
        let decoder = run_blocking(move || loader.load_decoder())
            .await
            .map_err(SegmentError::model_load)?;

        Ok(ModelSession {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
        })
    }

    /// Encode an image and make it the current one
    ///
    /// Initializes the models first if needed. A failure leaves the previous
    /// image, embedding and masks in place.
    pub async fn embed(&self, source: SourceImage) -> Result<Arc<Embedding>> {
        let (models, generation) = match self.models() {
            Some(ready) => ready,
            None => {
                self.initialize().await?;
                self.models().ok_or_else(|| {
                    SegmentError::precondition("models were released during initialization")
                })?
            }
        };

        self.report(0, "Encoding image");
        let (width, height) = source.dimensions();
        tracing::info!("Embedding {}x{} image", width, height);

        let normalizer = self.normalizer;
        let (normalized, original, embedding) = run_blocking(move || {
            // Letterbox and planar fill are as heavy as the encoder call
            let normalized = normalizer.normalize(&source)?;
            let original = source.to_rgba();

            let mut encoder = models.encoder.lock();
            let embedding = encoder.encode(&normalized)?;
            drop(encoder);
            Ok((normalized, original, embedding))
        })
        .await
        .map_err(|err| match err.downcast::<SegmentError>() {
            // rejected images keep their own kind
            Ok(err) => err,
            Err(err) => SegmentError::inference(err),
        })?;

        let embedding = Arc::new(embedding);
        {
            let slot = self.lifecycle.lock();
            if slot.generation != generation {
                return Err(SegmentError::precondition(
                    "session was disposed while encoding",
                ));
            }
            let mut state = self.state.lock();
            state.image = Some(Arc::new(normalized));
            state.source = Some(Arc::new(original));
            state.embedding = Some(Arc::clone(&embedding));
            state.masks = None;
        }

        self.report(100, "Image encoded");
        Ok(embedding)
    }

    /// Segment from a single point in normalized image coordinates
    pub async fn decode_from_point(&self, x: f32, y: f32, label: PointLabel) -> Result<Arc<MaskSet>> {
        self.decode(Prompt::Point { x, y, label }).await
    }

    /// Segment from a normalized [x1, y1, x2, y2] box
    pub async fn decode_from_box(&self, bbox: [f32; 4]) -> Result<Arc<MaskSet>> {
        self.decode(Prompt::Box(bbox)).await
    }

    /// Decode masks for a prompt against the current embedding
    pub async fn decode(&self, prompt: Prompt) -> Result<Arc<MaskSet>> {
        let embedding = self
            .state
            .lock()
            .embedding
            .clone()
            .ok_or_else(|| SegmentError::precondition("no embedding available"))?;
        let (models, generation) = self
            .models()
            .ok_or_else(|| SegmentError::precondition("models are not initialized"))?;

        self.report(0, "Decoding mask");
        tracing::info!("Decoding {:?}", prompt);

        let inputs = decoder_inputs(&prompt, INPUT_SIZE, MASK_SIZE);
        let decode_embedding = Arc::clone(&embedding);
        let decoded = run_blocking(move || {
            let mut decoder = models.decoder.lock();
            decoder.decode(&decode_embedding, &inputs)
        })
        .await
        .map_err(SegmentError::inference)?;
        let masks = Arc::new(into_mask_set(decoded, MASK_SIZE)?);

        {
            let slot = self.lifecycle.lock();
            if slot.generation != generation {
                return Err(SegmentError::precondition(
                    "session was disposed while decoding",
                ));
            }
            let mut state = self.state.lock();
            let current = state.embedding.as_ref();
            if !current.is_some_and(|current| Arc::ptr_eq(current, &embedding)) {
                return Err(SegmentError::precondition(
                    "image was replaced while decoding",
                ));
            }
            state.masks = Some(Arc::clone(&masks));
        }

        tracing::info!(
            "Selected mask {} of {} (score {:.3})",
            masks.best_index(),
            masks.len(),
            masks.scores()[masks.best_index()]
        );
        self.report(100, "Mask ready");
        Ok(masks)
    }

    /// Embed then decode the fixed person box
    ///
    /// The box is a framing heuristic for portrait photos, not a detector.
    pub async fn auto_segment_human(&self, source: SourceImage) -> Result<Arc<MaskSet>> {
        self.embed(source).await?;
        self.decode_from_box(HUMAN_BOX).await
    }

    /// Blend the current image with the selected mask at the image's resolution
    pub fn composite(&self, mode: CompositeMode, background: Rgba<u8>) -> Result<RgbaImage> {
        let (source, masks) = {
            let state = self.state.lock();
            (state.source.clone(), state.masks.clone())
        };
        let source = source.ok_or_else(|| SegmentError::precondition("no image available"))?;
        let masks = masks.ok_or_else(|| SegmentError::precondition("no mask available"))?;

        compose::composite(&source, masks.best(), masks.size(), mode, background)
    }

    /// Render one stored candidate (the selected one by default) as an M x M image
    pub fn current_mask(&self, index: Option<usize>) -> Result<GrayImage> {
        let masks = self
            .mask_set()
            .ok_or_else(|| SegmentError::precondition("no mask available"))?;
        let index = index.unwrap_or_else(|| masks.best_index());
        let mask = masks.mask(index).ok_or_else(|| {
            SegmentError::precondition(format!(
                "mask index {} out of range ({} masks)",
                index,
                masks.len()
            ))
        })?;
        mask_to_luma(mask, masks.size())
    }

    pub fn mask_set(&self) -> Option<Arc<MaskSet>> {
        self.state.lock().masks.clone()
    }

    /// Scores of the stored candidates, empty before the first decode
    pub fn mask_scores(&self) -> Vec<f32> {
        self.mask_set()
            .map(|masks| masks.scores().to_vec())
            .unwrap_or_default()
    }

    pub fn best_mask_index(&self) -> Option<usize> {
        self.mask_set().map(|masks| masks.best_index())
    }

    pub fn embedding(&self) -> Option<Arc<Embedding>> {
        self.state.lock().embedding.clone()
    }

    pub fn normalized_image(&self) -> Option<Arc<NormalizedImage>> {
        self.state.lock().image.clone()
    }

    /// Release both inference contexts and clear all derived state
    ///
    /// Safe to call repeatedly and from any state.
    pub fn dispose(&self) {
        let released = {
            let mut slot = self.lifecycle.lock();
            slot.generation += 1;
            let released = matches!(slot.state, Lifecycle::Ready(_));
            slot.state = Lifecycle::Uninitialized;
            released
        };
        *self.state.lock() = SessionState::default();

        if released {
            tracing::info!("Released segmentation models");
        }
    }
}
