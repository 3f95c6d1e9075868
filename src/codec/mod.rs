// External codec boundary: argument construction and subprocess execution

pub mod jbig2;
pub mod jpeg2000;

use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MrcError, Result};

/// One fully constructed external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Capture the tool's standard output into this file instead of
    /// discarding it.
    pub stdout_to: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        ToolInvocation {
            program: program.into(),
            args: Vec::new(),
            stdout_to: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// Whether `flag` appears among the arguments.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// The argument following `flag`, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&OsString> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1)
    }
}

/// Exit status of a finished tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ToolStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes [`ToolInvocation`]s. The pipeline only ever talks to this trait,
/// so tests can substitute a recording double for the real binaries.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolStatus>;
}

/// Check a tool's exit status, turning anything but success into a codec error.
pub fn run_checked(runner: &dyn ToolRunner, invocation: &ToolInvocation) -> Result<()> {
    let status = runner.run(invocation)?;
    if status.success() {
        return Ok(());
    }
    warn!(program = %invocation.program, code = ?status.code, "codec failed");
    Err(MrcError::codec(format!(
        "{} exited with {}",
        invocation.program,
        status
            .code
            .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
    )))
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs tools as child processes. Stderr is always discarded; stdout is
/// discarded unless the invocation captures it.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        SystemRunner { timeout }
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolStatus> {
        let stdout = match &invocation.stdout_to {
            Some(path) => Stdio::from(File::create(path)?),
            None => Stdio::null(),
        };

        debug!(program = %invocation.program, args = ?invocation.args, "running codec");
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MrcError::codec(format!("failed to execute {}: {e}", invocation.program))
            })?;

        let Some(timeout) = self.timeout else {
            let status = child.wait()?;
            return Ok(ToolStatus {
                code: status.code(),
            });
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(ToolStatus {
                    code: status.code(),
                });
            }
            if started.elapsed() > timeout {
                warn!(program = %invocation.program, ?timeout, "codec timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(MrcError::codec_timeout(format!(
                    "{} did not finish within {:?}",
                    invocation.program, timeout
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Program names (or paths) of the external codecs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub jbig2: String,
    pub kdu_compress: String,
    pub kdu_expand: String,
    pub opj_compress: String,
    pub opj_decompress: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            jbig2: "jbig2".to_string(),
            kdu_compress: "kdu_compress".to_string(),
            kdu_expand: "kdu_expand".to_string(),
            opj_compress: "opj_compress".to_string(),
            opj_decompress: "opj_decompress".to_string(),
        }
    }
}
