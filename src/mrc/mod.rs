pub mod compositor;
pub mod denoise;
pub mod disambiguate;
pub mod encoder;
pub mod fill;
pub mod filter;
pub mod gray;
pub mod mask;
pub mod noise;
pub mod threshold;

use image::DynamicImage;
use serde::Serialize;
use tempfile::TempPath;

use crate::input::layout::PageLayout;
use mask::Mask;

/// Pixel layout of a page as it enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Bilevel,
    Grayscale,
    Rgb,
    Rgba,
}

/// Page pixels, normalized to one of the supported [`ColorMode`]s.
#[derive(Debug, Clone)]
pub enum PageImage {
    /// Already a 1-bit image; `true` is ink.
    Bilevel(Mask),
    /// 8-bit luma, RGB or RGBA.
    Raster(DynamicImage),
}

impl PageImage {
    /// Wrap a decoded image, narrowing exotic pixel formats to 8 bits.
    pub fn raster(image: DynamicImage) -> Self {
        let image = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                image
            }
            DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        PageImage::Raster(image)
    }

    pub fn mode(&self) -> ColorMode {
        match self {
            PageImage::Bilevel(_) => ColorMode::Bilevel,
            PageImage::Raster(DynamicImage::ImageLuma8(_)) => ColorMode::Grayscale,
            PageImage::Raster(DynamicImage::ImageRgba8(_)) => ColorMode::Rgba,
            PageImage::Raster(_) => ColorMode::Rgb,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PageImage::Bilevel(mask) => mask.dimensions(),
            PageImage::Raster(image) => (image.width(), image.height()),
        }
    }
}

/// One page ready for decomposition.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based index in the source document.
    pub index: usize,
    pub image: PageImage,
    pub layout: PageLayout,
}

/// Per-page quality settings, fixed before the page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParams {
    pub hq: bool,
    pub fg_slope: u32,
    pub bg_slope: u32,
    /// OpenJPEG constant compression ratio for backgrounds.
    pub bg_ratio: u32,
    /// OpenJPEG target PSNR for foregrounds.
    pub fg_psnr: u32,
    /// Background reduction factor; never applied to HQ pages.
    pub bg_downsample: Option<u32>,
}

impl Default for CompressionParams {
    fn default() -> Self {
        CompressionParams {
            hq: false,
            fg_slope: 49000,
            bg_slope: 47000,
            bg_ratio: 400,
            fg_psnr: 25,
            bg_downsample: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Foreground,
    Background,
}

/// A filled foreground or background layer awaiting encoding.
#[derive(Debug, Clone)]
pub struct Layer {
    pub kind: LayerKind,
    pub image: DynamicImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Jbig2,
    Png,
    Jpeg2000,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Jbig2 => "jbig2",
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg2000 => "jp2",
        }
    }
}

/// An encoded layer. The scratch file is removed when the artifact is dropped.
#[derive(Debug)]
pub struct EncodedArtifact {
    pub path: TempPath,
    pub bytes: Vec<u8>,
    pub format: ArtifactFormat,
    pub width: u32,
    pub height: u32,
}

/// The three encoded layers of a decomposed page.
#[derive(Debug)]
pub struct MrcArtifacts {
    pub mask: EncodedArtifact,
    pub foreground: EncodedArtifact,
    pub background: EncodedArtifact,
}

/// Result of processing one page.
#[derive(Debug)]
pub enum PageOutput {
    Mrc(MrcArtifacts),
    /// Bilevel input: the image is its own mask.
    Bilevel(EncodedArtifact),
}

impl PageOutput {
    pub fn mask(&self) -> &EncodedArtifact {
        match self {
            PageOutput::Mrc(layers) => &layers.mask,
            PageOutput::Bilevel(mask) => mask,
        }
    }

    pub fn artifacts(&self) -> Vec<&EncodedArtifact> {
        match self {
            PageOutput::Mrc(layers) => vec![&layers.mask, &layers.foreground, &layers.background],
            PageOutput::Bilevel(mask) => vec![mask],
        }
    }
}
