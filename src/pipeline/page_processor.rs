// Page-level processing: decompose -> fill -> encode

use tracing::{debug, instrument};

use crate::mrc::compositor::{Decomposition, MaskOptions};
use crate::mrc::encoder::Encoder;
use crate::mrc::fill::ContentFill;
use crate::mrc::{CompressionParams, MrcArtifacts, Page, PageImage, PageOutput};
use crate::telemetry::context::PageContext;

/// Single page processing result.
#[derive(Debug)]
pub struct ProcessedPage {
    /// 0-based index in the source document.
    pub page_index: usize,
    pub output: PageOutput,
    /// Warnings and timings of this page, including its load.
    pub context: PageContext,
}

/// Process one page into its encoded artifacts.
///
/// Bilevel pages are their own mask and only the mask is encoded. All other
/// pages are decomposed and encoded layer by layer: mask, then foreground,
/// then background. Each layer is handed to the encoder by value so its
/// pixels are gone before the next one is produced.
#[instrument(skip_all, fields(page = page.index, hq = params.hq))]
pub fn process_page(
    page: Page,
    params: &CompressionParams,
    mask_options: &MaskOptions,
    encoder: &Encoder,
    fill: &dyn ContentFill,
    mut ctx: PageContext,
) -> crate::error::Result<ProcessedPage> {
    let Page {
        index,
        image,
        layout,
    } = page;

    let output = match image {
        PageImage::Bilevel(mask) => {
            debug!("bilevel page, mask only");
            PageOutput::Bilevel(encoder.encode_mask(&mask, &mut ctx)?)
        }
        PageImage::Raster(source) => {
            let decomposition = Decomposition::new(source, &layout, mask_options, &mut ctx)?;
            drop(layout);

            let mask = encoder.encode_mask(decomposition.mask(), &mut ctx)?;
            let foreground = decomposition.foreground(fill, &mut ctx)?;
            let foreground = encoder.encode_layer(foreground, params, &mut ctx)?;
            let background =
                decomposition.into_background(fill, params.bg_downsample, &mut ctx)?;
            let background = encoder.encode_layer(background, params, &mut ctx)?;

            PageOutput::Mrc(MrcArtifacts {
                mask,
                foreground,
                background,
            })
        }
    };

    Ok(ProcessedPage {
        page_index: index,
        output,
        context: ctx,
    })
}
