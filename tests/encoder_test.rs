// Layer encoding tests against a recording tool runner

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use mrc_recode::codec::jpeg2000::CodecChoice;
use mrc_recode::codec::{ToolInvocation, ToolPaths, ToolRunner, ToolStatus};
use mrc_recode::error::MrcError;
use mrc_recode::mrc::encoder::{Encoder, EncoderConfig};
use mrc_recode::mrc::mask::Mask;
use mrc_recode::mrc::{ArtifactFormat, CompressionParams, Layer, LayerKind};
use mrc_recode::telemetry::context::{PageContext, Stage};

/// Records every invocation and fakes the tool's output file.
struct RecordingRunner {
    exit_code: i32,
    calls: Mutex<Vec<ToolInvocation>>,
    output_existed: Mutex<Vec<bool>>,
}

impl RecordingRunner {
    fn new(exit_code: i32) -> Arc<Self> {
        Arc::new(RecordingRunner {
            exit_code,
            calls: Mutex::new(Vec::new()),
            output_existed: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> mrc_recode::error::Result<ToolStatus> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(out) = invocation.arg_after("-o") {
            self.output_existed.lock().unwrap().push(Path::new(out).exists());
        }
        if self.exit_code == 0 {
            if let Some(path) = &invocation.stdout_to {
                std::fs::write(path, b"JB2 fake")?;
            } else if let Some(out) = invocation.arg_after("-o") {
                std::fs::write(out, b"JP2 fake")?;
            }
        }
        Ok(ToolStatus {
            code: Some(self.exit_code),
        })
    }
}

fn encoder(
    scratch: &Path,
    jbig2: bool,
    codec: CodecChoice,
    runner: Arc<RecordingRunner>,
) -> Encoder {
    let config = EncoderConfig {
        scratch_dir: Some(scratch.to_path_buf()),
        jbig2,
        codec,
        tools: ToolPaths::default(),
    };
    Encoder::new(&config, runner)
}

fn scratch_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

fn gray_layer(kind: LayerKind) -> Layer {
    Layer {
        kind,
        image: DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 12, Luma([128]))),
    }
}

// ============================================================
// 1. Mask encoding
// ============================================================

#[test]
fn test_mask_without_jbig2_is_png_and_runs_nothing() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let enc = encoder(scratch.path(), false, CodecChoice::Kakadu, runner.clone());

    let mask = Mask::from_fn(10, 6, |x, y| x == y);
    let mut ctx = PageContext::default();
    let artifact = enc.encode_mask(&mask, &mut ctx).expect("encode mask");

    assert!(runner.calls().is_empty(), "no codec should be invoked");
    assert_eq!(artifact.format, ArtifactFormat::Png);
    assert_eq!((artifact.width, artifact.height), (10, 6));

    // The artifact decodes back to the mask: set pixels are black.
    let decoded = image::load_from_memory(&artifact.bytes).unwrap().to_luma8();
    assert_eq!(decoded.dimensions(), (10, 6));
    assert_eq!(decoded.get_pixel(2, 2)[0], 0);
    assert_eq!(decoded.get_pixel(3, 2)[0], 255);
    assert_eq!(ctx.timings[0].0, Stage::MaskEncode);
}

#[test]
fn test_mask_with_jbig2_captures_stdout() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let enc = encoder(scratch.path(), true, CodecChoice::Kakadu, runner.clone());

    let mut ctx = PageContext::default();
    let artifact = enc
        .encode_mask(&Mask::new(8, 8), &mut ctx)
        .expect("encode mask");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "jbig2");
    assert!(calls[0].stdout_to.is_some());
    assert_eq!(artifact.format, ArtifactFormat::Jbig2);
    assert_eq!(artifact.bytes, b"JB2 fake");

    // Only the artifact itself is left in the scratch directory.
    assert_eq!(scratch_entries(scratch.path()).len(), 1);
    drop(artifact);
    assert!(scratch_entries(scratch.path()).is_empty());
}

// ============================================================
// 2. Layer encoding
// ============================================================

#[test]
fn test_openjpeg_background_uses_ratio_foreground_uses_psnr() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let enc = encoder(scratch.path(), false, CodecChoice::OpenJpeg, runner.clone());
    let params = CompressionParams::default();
    let mut ctx = PageContext::default();

    let bg = enc
        .encode_layer(gray_layer(LayerKind::Background), &params, &mut ctx)
        .expect("encode bg");
    let fg = enc
        .encode_layer(gray_layer(LayerKind::Foreground), &params, &mut ctx)
        .expect("encode fg");

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program, "opj_compress");
    assert_eq!(calls[0].arg_after("-r").unwrap(), "400");
    assert!(!calls[0].has_arg("-q"));
    assert_eq!(calls[1].arg_after("-q").unwrap(), "25");
    assert!(!calls[1].has_arg("-r"));
    assert_eq!(calls[1].arg_after("-threads").unwrap(), "1");

    assert_eq!(bg.format, ArtifactFormat::Jpeg2000);
    assert_eq!((fg.width, fg.height), (16, 12));
    let stages: Vec<Stage> = ctx.timings.iter().map(|(s, _)| *s).collect();
    assert_eq!(stages, vec![Stage::BackgroundEncode, Stage::ForegroundEncode]);
}

#[test]
fn test_kakadu_uses_slope_per_layer() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let enc = encoder(scratch.path(), false, CodecChoice::Kakadu, runner.clone());
    let params = CompressionParams {
        fg_slope: 48000,
        bg_slope: 46000,
        ..CompressionParams::default()
    };
    let mut ctx = PageContext::default();

    let _fg = enc
        .encode_layer(gray_layer(LayerKind::Foreground), &params, &mut ctx)
        .unwrap();
    let rgb = Layer {
        kind: LayerKind::Background,
        image: DynamicImage::ImageRgb8(RgbImage::new(5, 5)),
    };
    let _bg = enc.encode_layer(rgb, &params, &mut ctx).unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0].program, "kdu_compress");
    assert_eq!(calls[0].arg_after("-slope").unwrap(), "48000");
    assert_eq!(calls[1].arg_after("-slope").unwrap(), "46000");
    let input = PathBuf::from(calls[0].arg_after("-i").unwrap());
    assert_eq!(input.extension().unwrap(), "tiff");
}

#[test]
fn test_codec_output_absent_before_invocation() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let enc = encoder(scratch.path(), false, CodecChoice::OpenJpeg, runner.clone());
    let mut ctx = PageContext::default();

    let _art = enc
        .encode_layer(
            gray_layer(LayerKind::Foreground),
            &CompressionParams::default(),
            &mut ctx,
        )
        .unwrap();
    assert_eq!(*runner.output_existed.lock().unwrap(), vec![false]);
}

#[test]
fn test_jbig2_failure_is_error_and_cleans_scratch() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(1);
    let enc = encoder(scratch.path(), true, CodecChoice::Kakadu, runner.clone());
    let mut ctx = PageContext::default();

    let result = enc.encode_mask(&Mask::from_fn(8, 8, |x, _| x < 4), &mut ctx);

    assert!(matches!(result, Err(MrcError::CodecError(_))));
    assert_eq!(runner.calls().len(), 1);
    assert!(
        scratch_entries(scratch.path()).is_empty(),
        "bitmap and capture files should be removed on failure"
    );
}

#[test]
fn test_codec_failure_is_error_and_cleans_scratch() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new(1);
    let enc = encoder(scratch.path(), false, CodecChoice::Kakadu, runner.clone());
    let mut ctx = PageContext::default();

    let result = enc.encode_layer(
        gray_layer(LayerKind::Background),
        &CompressionParams::default(),
        &mut ctx,
    );
    assert!(matches!(result, Err(MrcError::CodecError(_))));
    assert!(
        scratch_entries(scratch.path()).is_empty(),
        "intermediate files should be removed on failure"
    );
}
