// Page source backed by a directory of page images plus an OCR layout

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageReader};
use tracing::debug;

use super::PageSource;
use super::layout::OcrLayout;
use crate::codec::jpeg2000::WaveletCodec;
use crate::codec::{ToolRunner, run_checked};
use crate::error::{MrcError, Result};
use crate::mrc::mask::Mask;
use crate::mrc::{Page, PageImage};
use crate::telemetry::context::{PageContext, Stage};

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "tif", "tiff", "bmp", "pnm", "pbm", "pgm", "ppm", "jp2", "jpx",
];

const JPEG2000_EXTENSIONS: &[&str] = &["jp2", "jpx"];

/// Decodes JPEG 2000 page images through the configured wavelet codec.
#[derive(Clone)]
pub struct Jpeg2000Decoder {
    pub codec: Arc<dyn WaveletCodec>,
    pub runner: Arc<dyn ToolRunner>,
    pub scratch_dir: PathBuf,
}

impl Jpeg2000Decoder {
    /// Decode `path`, dropping `reduce` resolution levels.
    pub fn decode(&self, path: &Path, reduce: u32) -> Result<DynamicImage> {
        let output = tempfile::Builder::new()
            .prefix("in")
            .suffix(&format!(".{}", self.codec.decoded_extension()))
            .tempfile_in(&self.scratch_dir)?
            .into_temp_path();
        std::fs::remove_file(&output)?;

        run_checked(self.runner.as_ref(), &self.codec.expand(path, &output, reduce))?;
        let image = ImageReader::open(&output)?.with_guessed_format()?.decode()?;
        Ok(image)
    }
}

/// Sorted page images from one directory, paired page-by-page with an OCR
/// layout.
pub struct ImageStackSource {
    files: Vec<PathBuf>,
    layout: OcrLayout,
    downsample: Option<u32>,
    decoder: Option<Jpeg2000Decoder>,
}

impl ImageStackSource {
    /// Collect the image files of `dir` in name order.
    pub fn open(
        dir: &Path,
        layout: OcrLayout,
        downsample: Option<u32>,
        decoder: Option<Jpeg2000Decoder>,
    ) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            MrcError::image_load(format!("Failed to read image directory {}: {e}", dir.display()))
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, IMAGE_EXTENSIONS) {
                files.push(path);
            }
        }
        files.sort();
        Self::from_files(files, layout, downsample, decoder)
    }

    /// Use an explicit, already ordered list of page images.
    pub fn from_files(
        files: Vec<PathBuf>,
        layout: OcrLayout,
        downsample: Option<u32>,
        decoder: Option<Jpeg2000Decoder>,
    ) -> Result<Self> {
        if files.len() != layout.page_count() {
            return Err(MrcError::layout(format!(
                "OCR layout has {} pages but {} page images were found",
                layout.page_count(),
                files.len()
            )));
        }
        Ok(ImageStackSource {
            files,
            layout,
            downsample,
            decoder,
        })
    }

    fn decode_jpeg2000(&self, path: &Path) -> Result<(DynamicImage, bool)> {
        let decoder = self.decoder.as_ref().ok_or_else(|| {
            MrcError::image_load(format!("No JPEG 2000 decoder for {}", path.display()))
        })?;
        match self.downsample.and_then(reduce_levels) {
            Some(levels) => Ok((decoder.decode(path, levels)?, true)),
            None => Ok((decoder.decode(path, 0)?, false)),
        }
    }
}

impl PageSource for ImageStackSource {
    fn page_count(&self) -> usize {
        self.files.len()
    }

    fn load_page(&self, index: usize, ctx: &mut PageContext) -> Result<Page> {
        let started = Instant::now();
        let path = self.files.get(index).ok_or_else(|| {
            MrcError::image_load(format!("page {index} out of range ({} pages)", self.files.len()))
        })?;

        let (image, already_reduced) = if has_extension(path, JPEG2000_EXTENSIONS) {
            let (image, reduced) = self.decode_jpeg2000(path)?;
            (PageImage::raster(image), reduced)
        } else {
            (read_page_image(path)?, false)
        };

        let image = match self.downsample {
            Some(factor) if factor > 1 && !already_reduced => downsample_page(image, factor),
            _ => image,
        };
        ctx.record(Stage::ImageLoad, started.elapsed());

        let (width, height) = image.dimensions();
        debug!(index, width, height, mode = ?image.mode(), path = %path.display(), "page loaded");

        Ok(Page {
            index,
            image,
            layout: self.layout.pages[index].clone(),
        })
    }
}

/// Decode a page image, keeping 1-bit sources bilevel.
pub fn read_page_image(path: &Path) -> Result<PageImage> {
    let decoder = ImageReader::open(path)?.with_guessed_format()?.into_decoder()?;
    let bilevel = decoder.original_color_type() == ExtendedColorType::L1;
    let image = DynamicImage::from_decoder(decoder)?;
    if bilevel {
        Ok(PageImage::Bilevel(Mask::from_bilevel_image(&image.to_luma8())))
    } else {
        Ok(PageImage::raster(image))
    }
}

/// Shrink a page by `factor`: Lanczos for raster pages, nearest neighbour for
/// bilevel ones.
pub fn downsample_page(image: PageImage, factor: u32) -> PageImage {
    let (w, h) = image.dimensions();
    let (tw, th) = ((w / factor).max(1), (h / factor).max(1));
    match image {
        PageImage::Bilevel(mask) => PageImage::Bilevel(mask.resize_nearest(tw, th)),
        PageImage::Raster(img) => PageImage::Raster(img.resize_exact(tw, th, FilterType::Lanczos3)),
    }
}

/// Resolution levels a JPEG 2000 decoder can drop for `factor`: only exact
/// powers of two map onto whole levels.
fn reduce_levels(factor: u32) -> Option<u32> {
    (factor > 1 && factor.is_power_of_two()).then(|| factor.trailing_zeros())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
}
