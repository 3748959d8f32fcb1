use super::types::{DecodedMasks, DecoderInputs, MaskSet, PointLabel, Prompt};
use crate::error::{Result, SegmentError};
use ndarray::{array, Array4};

/// Build single-shot decoder inputs for a prompt
///
/// Coordinates are scaled from [0, 1] into the `input_size` model space. A
/// point prompt is paired with a whole-image box; a box prompt carries a
/// placeholder point at the origin labelled background.
pub fn decoder_inputs(prompt: &Prompt, input_size: u32, mask_size: u32) -> DecoderInputs {
    let s = input_size as f32;
    let m = mask_size as usize;

    let (point, label, bbox) = match *prompt {
        Prompt::Point { x, y, label } => ([x * s, y * s], label.as_f32(), [0.0, 0.0, s, s]),
        Prompt::Box([x1, y1, x2, y2]) => (
            [0.0, 0.0],
            PointLabel::Background.as_f32(),
            [x1 * s, y1 * s, x2 * s, y2 * s],
        ),
    };

    DecoderInputs {
        point_coords: array![[[point[0], point[1]]]],
        point_labels: array![[label]],
        mask_input: Array4::zeros((1, 1, m, m)),
        has_mask_input: 0.0,
        orig_im_size: [s, s],
        boxes: array![[bbox[0], bbox[1], bbox[2], bbox[3]]],
    }
}

/// Index of the highest score; the first one wins on ties
pub fn select_best(scores: &[f32]) -> Option<usize> {
    let (first, rest) = scores.split_first()?;
    let mut best = 0;
    let mut best_score = *first;
    for (offset, &score) in rest.iter().enumerate() {
        if score > best_score {
            best = offset + 1;
            best_score = score;
        }
    }
    Some(best)
}

/// Validate decoder output against the mask size and pick the best candidate
pub fn into_mask_set(decoded: DecodedMasks, mask_size: u32) -> Result<MaskSet> {
    let DecodedMasks { masks, scores } = decoded;
    let cells = (mask_size * mask_size) as usize;

    let best = select_best(&scores)
        .ok_or_else(|| SegmentError::Inference("decoder returned no scores".to_string()))?;
    if masks.len() != scores.len() * cells {
        return Err(SegmentError::Inference(format!(
            "decoder returned {} mask values for {} scores, expected {}",
            masks.len(),
            scores.len(),
            scores.len() * cells
        )));
    }

    tracing::debug!(
        "Selected mask {} of {} (score {:.4})",
        best,
        scores.len(),
        scores[best]
    );

    Ok(MaskSet::new(masks, scores, mask_size, best))
}
