// JPEG 2000 command lines: Kakadu (slope) and OpenJPEG (ratio / PSNR)

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::{ToolInvocation, ToolPaths};
use crate::mrc::{CompressionParams, LayerKind};

/// A wavelet codec backend. Implementations only construct invocations;
/// running them is the [`super::ToolRunner`]'s job.
pub trait WaveletCodec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extension of the intermediate file handed to the compressor.
    fn intermediate_extension(&self) -> &'static str;

    /// Extension of the file the decompressor writes.
    fn decoded_extension(&self) -> &'static str;

    fn compress(
        &self,
        input: &Path,
        output: &Path,
        kind: LayerKind,
        params: &CompressionParams,
    ) -> ToolInvocation;

    /// Decode `input`, discarding `reduce` resolution levels (each halves
    /// both dimensions).
    fn expand(&self, input: &Path, output: &Path, reduce: u32) -> ToolInvocation;
}

/// Kakadu: multithreaded, rate-controlled by a distortion-length slope.
#[derive(Debug, Clone)]
pub struct Kakadu {
    compress_program: String,
    expand_program: String,
}

impl Kakadu {
    pub fn new(tools: &ToolPaths) -> Self {
        Kakadu {
            compress_program: tools.kdu_compress.clone(),
            expand_program: tools.kdu_expand.clone(),
        }
    }
}

impl WaveletCodec for Kakadu {
    fn name(&self) -> &'static str {
        "kakadu"
    }

    fn intermediate_extension(&self) -> &'static str {
        "tiff"
    }

    fn decoded_extension(&self) -> &'static str {
        "tiff"
    }

    fn compress(
        &self,
        input: &Path,
        output: &Path,
        kind: LayerKind,
        params: &CompressionParams,
    ) -> ToolInvocation {
        let slope = match kind {
            LayerKind::Foreground => params.fg_slope,
            LayerKind::Background => params.bg_slope,
        };
        ToolInvocation::new(&self.compress_program)
            .arg("-num_threads")
            .arg("0")
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-slope")
            .arg(slope.to_string())
    }

    fn expand(&self, input: &Path, output: &Path, reduce: u32) -> ToolInvocation {
        let inv = ToolInvocation::new(&self.expand_program)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output);
        if reduce > 0 {
            inv.arg("-reduce").arg(reduce.to_string())
        } else {
            inv
        }
    }
}

/// OpenJPEG: single-threaded. The background is always compressed at a
/// constant ratio and the foreground always at a target PSNR.
#[derive(Debug, Clone)]
pub struct OpenJpeg {
    compress_program: String,
    expand_program: String,
}

impl OpenJpeg {
    pub fn new(tools: &ToolPaths) -> Self {
        OpenJpeg {
            compress_program: tools.opj_compress.clone(),
            expand_program: tools.opj_decompress.clone(),
        }
    }
}

impl WaveletCodec for OpenJpeg {
    fn name(&self) -> &'static str {
        "openjpeg"
    }

    fn intermediate_extension(&self) -> &'static str {
        "pnm"
    }

    fn decoded_extension(&self) -> &'static str {
        "pnm"
    }

    fn compress(
        &self,
        input: &Path,
        output: &Path,
        kind: LayerKind,
        params: &CompressionParams,
    ) -> ToolInvocation {
        let inv = ToolInvocation::new(&self.compress_program)
            .arg("-threads")
            .arg("1")
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output);
        match kind {
            LayerKind::Background => inv.arg("-r").arg(params.bg_ratio.to_string()),
            LayerKind::Foreground => inv.arg("-q").arg(params.fg_psnr.to_string()),
        }
    }

    fn expand(&self, input: &Path, output: &Path, reduce: u32) -> ToolInvocation {
        let inv = ToolInvocation::new(&self.expand_program);
        let inv = if reduce > 0 {
            inv.arg("-r").arg(reduce.to_string())
        } else {
            inv
        };
        inv.arg("-i").arg(input).arg("-o").arg(output)
    }
}

/// Configured wavelet backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecChoice {
    #[default]
    Kakadu,
    #[serde(rename = "openjpeg")]
    OpenJpeg,
}

impl CodecChoice {
    pub fn build(self, tools: &ToolPaths) -> Arc<dyn WaveletCodec> {
        match self {
            CodecChoice::Kakadu => Arc::new(Kakadu::new(tools)),
            CodecChoice::OpenJpeg => Arc::new(OpenJpeg::new(tools)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn params() -> CompressionParams {
        CompressionParams {
            fg_slope: 49000,
            bg_slope: 47000,
            bg_ratio: 400,
            fg_psnr: 25,
            ..CompressionParams::default()
        }
    }

    fn call(codec: &dyn WaveletCodec, kind: LayerKind) -> ToolInvocation {
        codec.compress(Path::new("in"), Path::new("out.jp2"), kind, &params())
    }

    #[test]
    fn test_kakadu_uses_layer_slope() {
        let kdu = Kakadu::new(&ToolPaths::default());
        let fg = call(&kdu, LayerKind::Foreground);
        let bg = call(&kdu, LayerKind::Background);
        assert_eq!(fg.program, "kdu_compress");
        assert_eq!(fg.arg_after("-num_threads"), Some(&OsString::from("0")));
        assert_eq!(fg.arg_after("-slope"), Some(&OsString::from("49000")));
        assert_eq!(bg.arg_after("-slope"), Some(&OsString::from("47000")));
    }

    #[test]
    fn test_openjpeg_rate_modes_follow_layer_kind() {
        let opj = OpenJpeg::new(&ToolPaths::default());
        let bg = call(&opj, LayerKind::Background);
        assert_eq!(bg.arg_after("-r"), Some(&OsString::from("400")));
        assert!(!bg.has_arg("-q"));

        let fg = call(&opj, LayerKind::Foreground);
        assert_eq!(fg.arg_after("-q"), Some(&OsString::from("25")));
        assert!(!fg.has_arg("-r"));
        assert_eq!(fg.arg_after("-threads"), Some(&OsString::from("1")));
    }

    #[test]
    fn test_expand_reduce_flag() {
        let tools = ToolPaths::default();
        let kdu = Kakadu::new(&tools).expand(Path::new("a.jp2"), Path::new("a.tiff"), 1);
        assert_eq!(kdu.arg_after("-reduce"), Some(&OsString::from("1")));
        let opj = OpenJpeg::new(&tools).expand(Path::new("a.jp2"), Path::new("a.pnm"), 0);
        assert!(!opj.has_arg("-r"));
    }

    #[test]
    fn test_codec_choice_from_yaml() {
        let choice: CodecChoice = serde_yml::from_str("openjpeg").unwrap();
        assert_eq!(choice, CodecChoice::OpenJpeg);
        assert_eq!(choice.build(&ToolPaths::default()).name(), "openjpeg");
    }
}
