// External progress reporter fed JSON on stdin

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::error::{MrcError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub count: usize,
    /// Wall-clock milliseconds per page over the reporting window.
    #[serde(rename = "time-per")]
    pub time_per: u64,
}

/// Progress message sent at every reporting interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPayload {
    pub compress_pages: PageCount,
    /// Mean milliseconds per page for each timed stage.
    pub page_time_breakdown: BTreeMap<String, u64>,
}

pub trait Reporter: Send + Sync {
    fn report(&self, payload: &ReportPayload) -> Result<()>;
}

/// Runs a command for every report, writing the payload to its stdin.
#[derive(Debug, Clone)]
pub struct CommandReporter {
    program: String,
    args: Vec<String>,
}

impl CommandReporter {
    /// Split `command_line` on whitespace into program and arguments.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| MrcError::config("reporter command is empty"))?;
        Ok(CommandReporter {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Reporter for CommandReporter {
    fn report(&self, payload: &ReportPayload) -> Result<()> {
        let data = serde_json::to_vec(payload)
            .map_err(|e| MrcError::report(format!("Failed to serialize report: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| MrcError::report(format!("failed to execute {}: {e}", self.program)))?;

        // The child is reaped before any write error is returned. A reporter
        // that exits without reading its input is judged by its exit status.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&data),
            None => Ok(()),
        };
        let status = child.wait()?;
        if let Err(e) = written
            && e.kind() != ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }
        if !status.success() {
            return Err(MrcError::report(format!(
                "{} exited with {}",
                self.program,
                status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
            )));
        }
        Ok(())
    }
}
