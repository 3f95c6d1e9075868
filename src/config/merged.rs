use std::path::PathBuf;
use std::time::Duration;

use super::job::Job;
use super::settings::Settings;
use crate::codec::ToolPaths;
use crate::codec::jpeg2000::CodecChoice;
use crate::error::MrcError;

#[derive(Debug, Clone)]
pub struct MergedConfig {
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
    pub grayscale: bool,
    pub parallel_workers: usize,
    pub report_every: Option<usize>,
    pub reporter: Option<String>,
    pub tmp_dir: Option<PathBuf>,
    pub codec_timeout: Option<Duration>,
    pub tools: ToolPaths,
    /// 0-based source pages to skip.
    pub skip_pages: Vec<usize>,
    pub hq_pages: Vec<i64>,
    pub stop_after: Option<usize>,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    pub fn new(settings: &Settings, job: &Job) -> Self {
        MergedConfig {
            jbig2: job.jbig2.unwrap_or(settings.jbig2),
            codec: job.codec.unwrap_or(settings.codec),
            bg_slope: job.bg_slope.unwrap_or(settings.bg_slope),
            fg_slope: job.fg_slope.unwrap_or(settings.fg_slope),
            hq_bg_slope: settings.hq_bg_slope,
            hq_fg_slope: settings.hq_fg_slope,
            bg_ratio: settings.bg_ratio,
            fg_psnr: settings.fg_psnr,
            downsample: job.downsample.or(settings.downsample),
            bg_downsample: job.bg_downsample.or(settings.bg_downsample),
            denoise_mask: job.denoise_mask.unwrap_or(settings.denoise_mask),
            grayscale: job.grayscale.unwrap_or(settings.grayscale),
            parallel_workers: settings.parallel_workers,
            report_every: settings.report_every,
            reporter: settings.reporter.clone(),
            tmp_dir: settings.tmp_dir.clone(),
            codec_timeout: settings.codec_timeout_secs.map(Duration::from_secs),
            tools: settings.tools.clone(),
            skip_pages: job
                .skip_pages
                .iter()
                .flatten()
                .map(|&p| p as usize - 1)
                .collect(),
            hq_pages: job.hq_pages.clone().unwrap_or_default(),
            stop_after: job.stop_after,
        }
    }

    /// 数値パラメータの範囲を検証する。
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, factor) in [
            ("downsample", self.downsample),
            ("bg_downsample", self.bg_downsample),
        ] {
            if factor == Some(0) {
                return Err(MrcError::config(format!("{name} must be >= 1")));
            }
        }
        for (name, value) in [
            ("bg_slope", self.bg_slope),
            ("fg_slope", self.fg_slope),
            ("hq_bg_slope", self.hq_bg_slope),
            ("hq_fg_slope", self.hq_fg_slope),
            ("bg_ratio", self.bg_ratio),
            ("fg_psnr", self.fg_psnr),
        ] {
            if value == 0 {
                return Err(MrcError::config(format!("{name} must be > 0")));
            }
        }
        if self.report_every == Some(0) {
            return Err(MrcError::config("report_every must be > 0"));
        }
        Ok(())
    }
}
