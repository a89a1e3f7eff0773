//! Launching `perf script` as the trace source.

use crate::utils::config::{DEFAULT_PERF_BINARY, DEFAULT_PERF_INPUT, PERF_SCRIPT_FIELDS};
use crate::utils::error::CaptureError;
use log::{debug, info};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};

/// Builder for a `perf script` invocation
#[derive(Debug, Clone)]
pub struct PerfScript {
    binary: String,
    input: PathBuf,
}

impl Default for PerfScript {
    fn default() -> Self {
        Self {
            binary: DEFAULT_PERF_BINARY.to_string(),
            input: PathBuf::from(DEFAULT_PERF_INPUT),
        }
    }
}

impl PerfScript {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Use a different `perf` executable
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "script".to_string(),
            "-i".to_string(),
            self.input.display().to_string(),
            "--fields".to_string(),
            PERF_SCRIPT_FIELDS.to_string(),
            "--demangle".to_string(),
            "--ns".to_string(),
        ]
    }

    /// Start perf with stdout and stderr piped
    pub fn spawn(&self) -> Result<PerfProcess, CaptureError> {
        let args = self.args();
        info!("Running {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CaptureError::SpawnFailed {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        match (stdout, stderr) {
            (Some(stdout), Some(stderr)) => Ok(PerfProcess {
                child,
                stdout: Some(stdout),
                stderr,
            }),
            (stdout, _) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(CaptureError::PipeUnavailable(if stdout.is_none() {
                    "stdout"
                } else {
                    "stderr"
                }))
            }
        }
    }
}

/// A running `perf script`
#[derive(Debug)]
pub struct PerfProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: ChildStderr,
}

/// How perf exited, with everything it wrote to stderr
#[derive(Debug, Clone)]
pub struct PerfExit {
    pub status: ExitStatus,
    pub stderr: String,
}

impl PerfExit {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

impl PerfProcess {
    /// Hand the trace pipe to a reader; only the first call returns it
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Drain stderr, then reap the process.
    ///
    /// stderr is read to the end first so perf never blocks on a full pipe.
    pub fn wait(mut self) -> Result<PerfExit, CaptureError> {
        let mut raw = Vec::new();
        self.stderr
            .read_to_end(&mut raw)
            .map_err(CaptureError::WaitFailed)?;
        let status = self.child.wait().map_err(CaptureError::WaitFailed)?;
        let stderr = String::from_utf8_lossy(&raw).into_owned();
        debug!("perf exited with {} ({} bytes of stderr)", status, raw.len());
        Ok(PerfExit { status, stderr })
    }
}
