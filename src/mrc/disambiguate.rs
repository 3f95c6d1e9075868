// MRC: per-word polarity disambiguation driven by OCR bounding boxes

use std::time::Instant;

use image::GrayImage;
use image::imageops;
use tracing::{debug, warn};

use super::mask::Mask;
use super::threshold::ThresholdResult;
use crate::error::Result;
use crate::input::layout::{OcrParagraph, page_words};
use crate::telemetry::context::{PageContext, Stage, Warning};

/// Crops whose threshold noise is at or below this are taken as-is.
pub const WORD_NOISE_CUTOFF: f32 = 0.1;

/// Which candidate mask was written for a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    Inverted,
    /// Both candidates were equally centred; their union was kept.
    Union,
}

/// Result of disambiguating one word crop.
#[derive(Debug, Clone)]
pub struct WordDecision {
    pub mask: Mask,
    pub orientation: Orientation,
    /// Whether the inverted crop was thresholded at all.
    pub inverted_evaluated: bool,
}

/// Threshold one word crop in both polarities and pick the better result.
///
/// Dark-on-light text gives a clean, low-noise normal mask and the inverted
/// crop is never looked at. Noisier crops are compared against their
/// inversion; when the inversion is both cleaner and sparser, the candidate
/// whose set pixels sit closer to the crop centre wins.
pub fn disambiguate_word(crop: &GrayImage) -> Result<WordDecision> {
    let normal = ThresholdResult::evaluate(crop)?;
    if normal.noise <= WORD_NOISE_CUTOFF {
        return Ok(WordDecision {
            mask: normal.mask,
            orientation: Orientation::Normal,
            inverted_evaluated: false,
        });
    }

    let mut inverted_crop = crop.clone();
    imageops::invert(&mut inverted_crop);
    let inverted = ThresholdResult::evaluate(&inverted_crop)?;

    if normal.noise < inverted.noise
        || !(inverted.noise < normal.noise && inverted.set_count < normal.set_count)
    {
        return Ok(WordDecision {
            mask: normal.mask,
            orientation: Orientation::Normal,
            inverted_evaluated: true,
        });
    }

    let orientation = choose_by_centroid(&normal, &inverted);
    let mask = match orientation {
        Orientation::Normal => normal.mask,
        Orientation::Inverted => inverted.mask,
        Orientation::Union => Mask::union(&normal.mask, &inverted.mask)?,
    };
    Ok(WordDecision {
        mask,
        orientation,
        inverted_evaluated: true,
    })
}

/// Compare the mean distance of each candidate's set pixels to the crop centre.
///
/// Rows are the first coordinate and columns the second, centred at
/// `(rows / 2, cols / 2)`. The inverted candidate's distance measures the
/// column coordinate against both centre components.
fn choose_by_centroid(normal: &ThresholdResult, inverted: &ThresholdResult) -> Orientation {
    let (cols, rows) = normal.mask.dimensions();
    let center_row = rows as f64 / 2.0;
    let center_col = cols as f64 / 2.0;

    let mut normal_sum = 0.0f64;
    let mut inverted_sum = 0.0f64;
    for row in 0..rows {
        for col in 0..cols {
            let (r, c) = (row as f64, col as f64);
            if normal.mask.get(col, row) {
                normal_sum += ((center_row - r).powi(2) + (center_col - c).powi(2)).sqrt();
            }
            if inverted.mask.get(col, row) {
                inverted_sum += ((center_row - c).powi(2) + (center_col - c).powi(2)).sqrt();
            }
        }
    }
    if normal.set_count > 0 {
        normal_sum /= normal.set_count as f64;
    }
    if inverted.set_count > 0 {
        inverted_sum /= inverted.set_count as f64;
    }

    if normal_sum < inverted_sum {
        Orientation::Normal
    } else if inverted_sum < normal_sum {
        Orientation::Inverted
    } else {
        Orientation::Union
    }
}

/// Threshold every OCR word of a page into `mask`.
///
/// Word boxes are given in OCR-reference pixels and are divided by
/// `downsample` when the working image was reduced. Each decided crop
/// overwrites the mask region under its box. Unusable boxes are skipped:
/// boxes that collapse through downsampling silently, malformed or
/// out-of-image boxes with a warning in `ctx`.
pub fn apply_word_masks(
    gray: &GrayImage,
    mask: &mut Mask,
    layout: &[OcrParagraph],
    downsample: Option<u32>,
    ctx: &mut PageContext,
) -> Result<()> {
    let started = Instant::now();
    let (width, height) = gray.dimensions();
    let mut written = 0usize;

    for word in page_words(layout) {
        if word.text.trim().is_empty() {
            continue;
        }

        let bbox = match downsample {
            Some(factor) => {
                let scaled = word.bbox.scaled_down(factor);
                if scaled.is_collapsed() {
                    continue;
                }
                scaled
            }
            None => word.bbox,
        };

        if !bbox.is_well_formed() {
            warn!(?bbox, "invalid bounding box");
            ctx.warn(Warning::InvalidBoundingBox);
            continue;
        }
        if !bbox.fits_within(width, height) {
            warn!(?bbox, width, height, "bounding box outside image");
            ctx.warn(Warning::BoundingBoxOutsideImage);
            continue;
        }

        let (left, top) = (bbox.left as u32, bbox.top as u32);
        let (w, h) = ((bbox.right - bbox.left) as u32, (bbox.bottom - bbox.top) as u32);
        let crop = imageops::crop_imm(gray, left, top, w, h).to_image();
        let decision = disambiguate_word(&crop)?;
        mask.paste(&decision.mask, left, top)?;
        written += 1;
    }

    debug!(words = written, "word masks applied");
    ctx.record(Stage::HocrMaskGen, started.elapsed());
    Ok(())
}
