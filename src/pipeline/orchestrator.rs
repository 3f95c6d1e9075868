// 全ジョブ実行: MergedConfig -> concrete services -> run_job

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info_span;

use crate::codec::{SystemRunner, ToolRunner};
use crate::config::merged::MergedConfig;
use crate::input::image_stack::{ImageStackSource, Jpeg2000Decoder};
use crate::input::layout::OcrLayout;
use crate::mrc::encoder::{Encoder, EncoderConfig};
use crate::mrc::fill::NormalizedFill;
use crate::output::DirectorySink;
use crate::pipeline::job_runner::{JobConfig, JobResult, JobServices, run_job};
use crate::telemetry::reporter::{CommandReporter, Reporter};

/// A job with its paths resolved against the job file.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub images: PathBuf,
    pub layout: PathBuf,
    pub output: PathBuf,
    pub config: MergedConfig,
}

/// Run one job against the filesystem and the external codec binaries.
pub fn run_prepared_job(job: &PreparedJob) -> crate::error::Result<JobResult> {
    let _span = info_span!("job", images = %job.images.display()).entered();
    let merged = &job.config;
    merged.validate()?;

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner::new(merged.codec_timeout));
    let encoder = Encoder::new(
        &EncoderConfig {
            scratch_dir: merged.tmp_dir.clone(),
            jbig2: merged.jbig2,
            codec: merged.codec,
            tools: merged.tools.clone(),
        },
        Arc::clone(&runner),
    );
    let decoder = Jpeg2000Decoder {
        codec: merged.codec.build(&merged.tools),
        runner,
        scratch_dir: encoder.scratch_dir().to_path_buf(),
    };

    let layout = OcrLayout::from_file(&job.layout)?;
    let source = ImageStackSource::open(&job.images, layout, merged.downsample, Some(decoder))?;
    let mut sink = DirectorySink::create(&job.output)?;
    let reporter = merged
        .reporter
        .as_deref()
        .map(CommandReporter::from_command_line)
        .transpose()?;

    run_job(
        &JobConfig::from_merged(merged),
        JobServices {
            source: &source,
            sink: &mut sink,
            encoder: &encoder,
            fill: &NormalizedFill,
            reporter: reporter.as_ref().map(|r| r as &dyn Reporter),
        },
    )
}

/// Run multiple jobs, collecting results.
/// One job failure does NOT prevent other jobs from running.
pub fn run_all_jobs(jobs: &[PreparedJob]) -> Vec<crate::error::Result<JobResult>> {
    jobs.iter().map(run_prepared_job).collect()
}
