// MRC decomposition: page image + OCR words -> mask, foreground, background

use std::borrow::Cow;
use std::time::Instant;

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, instrument, warn};

use super::denoise::merge_page_threshold;
use super::disambiguate::apply_word_masks;
use super::fill::{BACKGROUND_FILL_RADIUS, ContentFill, FOREGROUND_FILL_RADIUS};
use super::mask::Mask;
use super::{Layer, LayerKind};
use crate::input::layout::OcrParagraph;
use crate::telemetry::context::{PageContext, Stage, Warning};

/// Options that shape mask generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskOptions {
    /// Factor the working image was reduced by relative to the OCR layout.
    pub downsample: Option<u32>,
    /// Denoise the page-level threshold when it is noisy.
    pub denoise_mask: bool,
}

/// A page split into its text mask while still holding the source pixels.
///
/// Layers are derived one at a time: [`Decomposition::foreground`] borrows the
/// source, [`Decomposition::into_background`] consumes it. Callers encode and
/// drop the foreground before asking for the background, so the source, the
/// mask and at most one layer are alive at once.
pub struct Decomposition {
    source: DynamicImage,
    mask: Mask,
}

impl Decomposition {
    /// Build the final mask for `source`.
    ///
    /// Word crops are thresholded first, then the page-level pass is OR'd
    /// in. The grayscale working copy is released before returning.
    #[instrument(skip_all, fields(width = source.width(), height = source.height()))]
    pub fn new(
        source: DynamicImage,
        layout: &[OcrParagraph],
        options: &MaskOptions,
        ctx: &mut PageContext,
    ) -> crate::error::Result<Self> {
        let gray = match &source {
            DynamicImage::ImageLuma8(gray) => Cow::Borrowed(gray),
            other => {
                let started = Instant::now();
                let gray = other.to_luma8();
                ctx.record(Stage::GreyConversion, started.elapsed());
                Cow::Owned(gray)
            }
        };

        let mut mask = Mask::new(source.width(), source.height());
        apply_word_masks(&gray, &mut mask, layout, options.downsample, ctx)?;
        merge_page_threshold(&mut mask, &gray, options.denoise_mask, ctx)?;
        drop(gray);

        debug!(set = mask.count_set(), "mask finalized");
        Ok(Decomposition { source, mask })
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Foreground layer: text pixels kept, surroundings filled tightly.
    pub fn foreground(
        &self,
        fill: &dyn ContentFill,
        ctx: &mut PageContext,
    ) -> crate::error::Result<Layer> {
        let started = Instant::now();
        let image = fill.fill(&self.mask, &self.source, FOREGROUND_FILL_RADIUS)?;
        ctx.record(Stage::ForegroundFill, started.elapsed());
        Ok(Layer {
            kind: LayerKind::Foreground,
            image,
        })
    }

    /// Background layer: non-text pixels kept, text areas filled widely, then
    /// optionally reduced by `bg_downsample`. Releases the source image.
    pub fn into_background(
        self,
        fill: &dyn ContentFill,
        bg_downsample: Option<u32>,
        ctx: &mut PageContext,
    ) -> crate::error::Result<Layer> {
        let Decomposition { source, mask } = self;
        let inverted = mask.inverted();
        drop(mask);

        let started = Instant::now();
        let mut image = fill.fill(&inverted, &source, BACKGROUND_FILL_RADIUS)?;
        ctx.record(Stage::BackgroundFill, started.elapsed());
        drop(source);

        if let Some(factor) = bg_downsample {
            let started = Instant::now();
            image = downsample_background(image, factor, ctx);
            ctx.record(Stage::BackgroundDownsample, started.elapsed());
        }

        Ok(Layer {
            kind: LayerKind::Background,
            image,
        })
    }
}

/// Reduce the background by `factor`, or keep it at full size with a warning
/// when either target dimension would be zero.
pub fn downsample_background(
    image: DynamicImage,
    factor: u32,
    ctx: &mut PageContext,
) -> DynamicImage {
    let factor = factor.max(1);
    let (w, h) = (image.width() / factor, image.height() / factor);
    if w == 0 || h == 0 {
        warn!(
            width = image.width(),
            height = image.height(),
            factor,
            "background too small to downsample"
        );
        ctx.warn(Warning::TooSmallToDownsample);
        return image;
    }
    image.resize_exact(w, h, FilterType::CatmullRom)
}
