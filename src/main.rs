use std::path::Path;
use std::process::ExitCode;

use mrc_recode::config::merged::MergedConfig;
use mrc_recode::config::{self};
use mrc_recode::pipeline::orchestrator::{PreparedJob, run_all_jobs};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: mrc_recode <jobs.yaml>...");
        eprintln!("  Decompose scanned page images into MRC mask/foreground/background layers.");
        eprintln!("  Log level is controlled by RUST_LOG (default: info).");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("mrc_recode {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut jobs: Vec<PreparedJob> = Vec::new();

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file = match config::load_job_file(job_file_path) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: {e}");
                return ExitCode::FAILURE;
            }
        };

        for job in &job_file.jobs {
            jobs.push(PreparedJob {
                images: config::resolve_path(job_file_path, &job.images),
                layout: config::resolve_path(job_file_path, &job.layout),
                output: config::resolve_path(job_file_path, &job.output),
                config: MergedConfig::new(&settings, job),
            });
        }
    }

    let results = run_all_jobs(&jobs);

    let mut has_error = false;
    for (job, result) in jobs.iter().zip(&results) {
        match result {
            Ok(job_result) => {
                eprintln!(
                    "OK: {} -> {} ({} pages)",
                    job.images.display(),
                    job.output.display(),
                    job_result.pages_processed
                );
                if !job_result.warnings.is_empty() {
                    eprintln!("  warnings: {}", job_result.warnings.codes().join(", "));
                }
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    job.images.display(),
                    job.output.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
