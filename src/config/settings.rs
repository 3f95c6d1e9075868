use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::ToolPaths;
use crate::codec::jpeg2000::CodecChoice;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub jbig2: bool,
    pub codec: CodecChoice,
    pub bg_slope: u32,
    pub fg_slope: u32,
    pub hq_bg_slope: u32,
    pub hq_fg_slope: u32,
    pub bg_ratio: u32,
    pub fg_psnr: u32,
    pub downsample: Option<u32>,
    pub bg_downsample: Option<u32>,
    pub denoise_mask: bool,
    /// Convert colour pages to gray before decomposition.
    pub grayscale: bool,
    pub parallel_workers: usize,
    pub report_every: Option<usize>,
    /// Whitespace-separated command line of the progress reporter.
    pub reporter: Option<String>,
    pub tmp_dir: Option<PathBuf>,
    pub codec_timeout_secs: Option<u64>,
    pub tools: ToolPaths,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            jbig2: true,
            codec: CodecChoice::Kakadu,
            bg_slope: 47000,
            fg_slope: 49000,
            hq_bg_slope: 47000,
            hq_fg_slope: 47000,
            bg_ratio: 400,
            fg_psnr: 25,
            downsample: None,
            bg_downsample: None,
            denoise_mask: false,
            grayscale: false,
            parallel_workers: 0,
            report_every: None,
            reporter: None,
            tmp_dir: None,
            codec_timeout_secs: None,
            tools: ToolPaths::default(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::MrcError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
