// MRC: layer encoding through external JBIG2 / JPEG 2000 codecs

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tempfile::TempPath;
use tracing::debug;

use super::mask::Mask;
use super::{ArtifactFormat, CompressionParams, EncodedArtifact, Layer, LayerKind};
use crate::codec::jpeg2000::{CodecChoice, WaveletCodec};
use crate::codec::{ToolPaths, ToolRunner, jbig2, run_checked};
use crate::error::{MrcError, Result};
use crate::telemetry::context::{PageContext, Stage};

/// Encoder settings shared by every page of a job.
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Scratch directory; the system temp directory when `None`.
    pub scratch_dir: Option<PathBuf>,
    /// Compress masks with JBIG2. Otherwise the lossless PNG is the artifact.
    pub jbig2: bool,
    pub codec: CodecChoice,
    pub tools: ToolPaths,
}

/// Serializes masks and layers to scratch files and external codecs.
///
/// Every intermediate file is a [`TempPath`] and disappears when it goes out
/// of scope, on success and failure alike. Only the returned
/// [`EncodedArtifact`]s keep their file until they are dropped.
pub struct Encoder {
    scratch_dir: PathBuf,
    jbig2: bool,
    jbig2_program: String,
    codec: Arc<dyn WaveletCodec>,
    runner: Arc<dyn ToolRunner>,
}

impl Encoder {
    pub fn new(config: &EncoderConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Encoder {
            scratch_dir: config
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            jbig2: config.jbig2,
            jbig2_program: config.tools.jbig2.clone(),
            codec: config.codec.build(&config.tools),
            runner,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Write the mask as a lossless bitmap and, when enabled, compress it
    /// with JBIG2. With JBIG2 disabled the codec is never invoked.
    pub fn encode_mask(&self, mask: &Mask, ctx: &mut PageContext) -> Result<EncodedArtifact> {
        let started = Instant::now();
        let (width, height) = mask.dimensions();

        let png = self.scratch_file("mask", ArtifactFormat::Png.extension())?;
        write_bitmap_png(mask, &png)?;

        let (path, format) = if self.jbig2 {
            let output = self.scratch_file("mask", ArtifactFormat::Jbig2.extension())?;
            let invocation = jbig2::compress_invocation(&self.jbig2_program, &png, &output);
            run_checked(self.runner.as_ref(), &invocation)?;
            drop(png);
            (output, ArtifactFormat::Jbig2)
        } else {
            (png, ArtifactFormat::Png)
        };

        let artifact = read_artifact(path, format, width, height)?;
        ctx.record(Stage::MaskEncode, started.elapsed());
        debug!(bytes = artifact.bytes.len(), ?format, "mask encoded");
        Ok(artifact)
    }

    /// Write `layer` to an intermediate file and compress it to JPEG 2000.
    ///
    /// The layer's pixels are released as soon as the intermediate exists.
    /// The codec output path is created and then removed again, because the
    /// codecs refuse to overwrite an existing file.
    pub fn encode_layer(
        &self,
        layer: Layer,
        params: &CompressionParams,
        ctx: &mut PageContext,
    ) -> Result<EncodedArtifact> {
        let started = Instant::now();
        let Layer { kind, image } = layer;
        let (prefix, stage) = match kind {
            LayerKind::Foreground => ("fg", Stage::ForegroundEncode),
            LayerKind::Background => ("bg", Stage::BackgroundEncode),
        };
        let (width, height) = (image.width(), image.height());

        let intermediate = self.scratch_file(prefix, self.codec.intermediate_extension())?;
        write_intermediate(&image, &intermediate, self.codec.intermediate_extension())?;
        drop(image);

        let output = self.scratch_file(prefix, ArtifactFormat::Jpeg2000.extension())?;
        std::fs::remove_file(&output)?;

        let invocation = self.codec.compress(&intermediate, &output, kind, params);
        run_checked(self.runner.as_ref(), &invocation)?;
        drop(intermediate);

        let artifact = read_artifact(output, ArtifactFormat::Jpeg2000, width, height)?;
        ctx.record(stage, started.elapsed());
        debug!(?kind, width, height, bytes = artifact.bytes.len(), "layer encoded");
        Ok(artifact)
    }

    fn scratch_file(&self, prefix: &str, extension: &str) -> Result<TempPath> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.scratch_dir)?;
        Ok(file.into_temp_path())
    }
}

/// Uncompressed-filter 8-bit PNG of the mask bitmap (black ink on white).
fn write_bitmap_png(mask: &Mask, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Fast, FilterType::NoFilter);
    mask.to_bitmap()
        .write_with_encoder(encoder)
        .map_err(|e| MrcError::artifact(format!("Failed to write mask bitmap: {e}")))
}

fn write_intermediate(image: &DynamicImage, path: &Path, extension: &str) -> Result<()> {
    let result = match extension {
        "pnm" if image.color().has_alpha() => {
            DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, ImageFormat::Pnm)
        }
        "pnm" => image.save_with_format(path, ImageFormat::Pnm),
        _ => image.save_with_format(path, ImageFormat::Tiff),
    };
    result.map_err(|e| {
        MrcError::artifact(format!(
            "Failed to write intermediate {}: {e}",
            path.display()
        ))
    })
}

fn read_artifact(
    path: TempPath,
    format: ArtifactFormat,
    width: u32,
    height: u32,
) -> Result<EncodedArtifact> {
    let bytes = std::fs::read(&path).map_err(|e| {
        MrcError::artifact(format!("Failed to read {}: {e}", path.display()))
    })?;
    Ok(EncodedArtifact {
        path,
        bytes,
        format,
        width,
        height,
    })
}
