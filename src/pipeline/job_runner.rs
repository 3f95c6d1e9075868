// Job level: page plan -> parallel page processing -> in-order delivery

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::merged::MergedConfig;
use crate::error::MrcError;
use crate::input::PageSource;
use crate::mrc::CompressionParams;
use crate::mrc::compositor::MaskOptions;
use crate::mrc::encoder::Encoder;
use crate::mrc::fill::ContentFill;
use crate::mrc::gray;
use crate::output::PageSink;
use crate::pipeline::page_processor::{ProcessedPage, process_page};
use crate::telemetry::context::{ErrorSet, PageContext, RunContext, Stage};
use crate::telemetry::reporter::{PageCount, ReportPayload, Reporter};

/// Slopes and rates for normal and high-quality pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub fg_slope: u32,
    pub bg_slope: u32,
    pub hq_fg_slope: u32,
    pub hq_bg_slope: u32,
    pub bg_ratio: u32,
    pub fg_psnr: u32,
    pub bg_downsample: Option<u32>,
}

impl Default for QualitySettings {
    fn default() -> Self {
        QualitySettings {
            fg_slope: 49000,
            bg_slope: 47000,
            hq_fg_slope: 47000,
            hq_bg_slope: 47000,
            bg_ratio: 400,
            fg_psnr: 25,
            bg_downsample: None,
        }
    }
}

impl QualitySettings {
    /// Parameters of one page. HQ pages use the HQ slopes and keep their
    /// background at full resolution.
    pub fn params_for(&self, hq: bool) -> CompressionParams {
        CompressionParams {
            hq,
            fg_slope: if hq { self.hq_fg_slope } else { self.fg_slope },
            bg_slope: if hq { self.hq_bg_slope } else { self.bg_slope },
            bg_ratio: self.bg_ratio,
            fg_psnr: self.fg_psnr,
            bg_downsample: if hq { None } else { self.bg_downsample },
        }
    }
}

/// Configuration for a single job.
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    pub quality: QualitySettings,
    pub mask_options: MaskOptions,
    /// Colour pages are converted to gray before decomposition.
    pub grayscale: bool,
    /// 0-based source pages that are not processed at all.
    pub skip_pages: Vec<usize>,
    /// HQ output pages: positive values are 1-based, negative count from the end.
    pub hq_pages: Vec<i64>,
    /// Maximum number of output pages.
    pub stop_after: Option<usize>,
    /// 0 = one worker per core.
    pub parallel_workers: usize,
    pub report_every: Option<usize>,
}

impl JobConfig {
    pub fn from_merged(merged: &MergedConfig) -> Self {
        JobConfig {
            quality: QualitySettings {
                fg_slope: merged.fg_slope,
                bg_slope: merged.bg_slope,
                hq_fg_slope: merged.hq_fg_slope,
                hq_bg_slope: merged.hq_bg_slope,
                bg_ratio: merged.bg_ratio,
                fg_psnr: merged.fg_psnr,
                bg_downsample: merged.bg_downsample,
            },
            mask_options: MaskOptions {
                downsample: merged.downsample,
                denoise_mask: merged.denoise_mask,
            },
            grayscale: merged.grayscale,
            skip_pages: merged.skip_pages.clone(),
            hq_pages: merged.hq_pages.clone(),
            stop_after: merged.stop_after,
            parallel_workers: merged.parallel_workers,
            report_every: merged.report_every,
        }
    }
}

/// Collaborators a job runs against.
pub struct JobServices<'a> {
    pub source: &'a dyn PageSource,
    pub sink: &'a mut dyn PageSink,
    pub encoder: &'a Encoder,
    pub fill: &'a dyn ContentFill,
    pub reporter: Option<&'a dyn Reporter>,
}

/// Result of processing a single job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub pages_processed: usize,
    pub warnings: ErrorSet,
    /// Mean milliseconds per page for each stage over the whole job.
    pub timing_summary: BTreeMap<String, u64>,
}

/// One planned output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPage {
    /// Position in the output.
    pub output_index: usize,
    /// Index in the page source.
    pub source_index: usize,
    pub hq: bool,
}

/// Decide which source pages become which output pages.
pub fn plan_pages(config: &JobConfig, source_pages: usize) -> Vec<PlannedPage> {
    let limit = config.stop_after.unwrap_or(usize::MAX);
    let sources: Vec<usize> = (0..source_pages)
        .filter(|i| !config.skip_pages.contains(i))
        .take(limit)
        .collect();
    let hq = resolve_hq_pages(&config.hq_pages, sources.len());
    sources
        .into_iter()
        .enumerate()
        .map(|(output_index, source_index)| PlannedPage {
            output_index,
            source_index,
            hq: hq[output_index],
        })
        .collect()
}

/// HQフラグをページごとに展開する。
///
/// 正の値は1始まり、負の値は末尾から数える。範囲外の値は黙って無視する
/// (呼び出し側が正確なページ数を知らなくてもよいように)。
pub fn resolve_hq_pages(spec: &[i64], page_count: usize) -> Vec<bool> {
    let mut flags = vec![false; page_count];
    let n = page_count as u64;
    for &value in spec {
        let idx = if value > 0 { value - 1 } else { value };
        let distance = idx.unsigned_abs();
        if distance >= n {
            continue;
        }
        let idx = if idx < 0 { n - distance } else { distance };
        flags[idx as usize] = true;
    }
    flags
}

/// Run one job.
///
/// Pages are processed on a rayon pool in chunks as wide as the pool.
/// Within a chunk pages run in parallel; results are then consumed in page
/// order by this thread, which merges each page's warnings and timings,
/// delivers its artifacts and drives the progress reports. The first fatal
/// page error aborts the job once its chunk has finished.
pub fn run_job(
    config: &JobConfig,
    services: JobServices<'_>,
) -> crate::error::Result<JobResult> {
    let JobServices {
        source,
        sink,
        encoder,
        fill,
        reporter,
    } = services;

    let plan = plan_pages(config, source.page_count());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_workers)
        .build()
        .map_err(|e| MrcError::config(format!("Failed to build worker pool: {e}")))?;
    let chunk_size = pool.current_num_threads().max(1);
    info!(
        pages = plan.len(),
        workers = chunk_size,
        "starting job"
    );

    let mut run = RunContext::default();
    let mut progress = Progress::new(config.report_every, reporter);
    let mut pages_processed = 0usize;

    for chunk in plan.chunks(chunk_size) {
        let results: Vec<crate::error::Result<(PlannedPage, ProcessedPage)>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|planned| {
                    let mut ctx = PageContext::default();
                    let mut page = source.load_page(planned.source_index, &mut ctx)?;
                    if config.grayscale {
                        page = gray::convert_page(page, &mut ctx);
                    }
                    let params = config.quality.params_for(planned.hq);
                    let processed =
                        process_page(page, &params, &config.mask_options, encoder, fill, ctx)?;
                    Ok((*planned, processed))
                })
                .collect()
        });

        for result in results {
            let (planned, processed) = result?;
            let ProcessedPage {
                output, context, ..
            } = processed;
            run.absorb(context);

            let started = Instant::now();
            sink.deliver(planned.output_index, output)?;
            run.timings.push(Stage::PageImageInsertion, started.elapsed());

            pages_processed += 1;
            progress.page_done(&mut run, pages_processed);
        }
    }

    progress.finish(&mut run);
    sink.finish(&run.errors)?;

    let timing_summary = run.timings.summary(pages_processed);
    info!(
        pages = pages_processed,
        warnings = ?run.errors.codes(),
        "job finished"
    );
    Ok(JobResult {
        pages_processed,
        warnings: run.errors,
        timing_summary,
    })
}

/// Reporting cadence over windows of `every` pages.
struct Progress<'a> {
    every: Option<usize>,
    reporter: Option<&'a dyn Reporter>,
    window_pages: usize,
    window_started: Instant,
}

impl<'a> Progress<'a> {
    fn new(every: Option<usize>, reporter: Option<&'a dyn Reporter>) -> Self {
        Progress {
            every,
            reporter,
            window_pages: 0,
            window_started: Instant::now(),
        }
    }

    fn page_done(&mut self, run: &mut RunContext, total: usize) {
        self.window_pages += 1;
        if let Some(every) = self.every
            && self.window_pages % every == 0
        {
            info!(pages = total, "processed pages");
            self.flush(run);
        }
    }

    fn finish(&mut self, run: &mut RunContext) {
        if self.window_pages > 0 && self.reporter.is_some() {
            self.flush(run);
        }
    }

    fn flush(&mut self, run: &mut RunContext) {
        let breakdown = run.timings.flush(self.window_pages);
        if let Some(reporter) = self.reporter {
            let elapsed_ms = self.window_started.elapsed().as_secs_f64() * 1000.0;
            let payload = ReportPayload {
                compress_pages: PageCount {
                    count: self.window_pages,
                    time_per: (elapsed_ms / self.window_pages.max(1) as f64) as u64,
                },
                page_time_breakdown: breakdown,
            };
            if let Err(e) = reporter.report(&payload) {
                warn!(error = %e, "progress report failed");
            }
        }
        self.window_pages = 0;
        self.window_started = Instant::now();
    }
}
