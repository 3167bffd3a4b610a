//! Bounded execution of one external tool process.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AdapterError;

/// How a tool is launched: a program plus arguments placed before the
/// tool-specific ones (e.g. `npx @ast-grep/cli` or a wrapper script).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub program: String,
    #[serde(default)]
    pub leading_args: Vec<String>,
}

impl Executable {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs `executable` with `args` and waits at most `timeout`.
///
/// The child is spawned with `kill_on_drop`, so when the deadline passes the
/// pending wait is dropped and the process is killed.
pub async fn run_process(
    executable: &Executable,
    args: &[String],
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ProcessOutput, AdapterError> {
    if let Some(dir) = working_dir {
        if !dir.is_dir() {
            return Err(AdapterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("working directory does not exist: {}", dir.display()),
            )));
        }
    }

    let mut cmd = Command::new(&executable.program);
    cmd.args(&executable.leading_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    debug!(
        program = %executable.program,
        args = ?args,
        "Spawning search tool"
    );

    let start = Instant::now();
    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AdapterError::ExecutableNotFound {
            program: executable.program.clone(),
            message: e.to_string(),
        },
        _ => AdapterError::Io(e),
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            Ok(ProcessOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration: start.elapsed(),
            })
        }
        Ok(Err(e)) => Err(AdapterError::Io(e)),
        Err(_) => {
            warn!(
                program = %executable.program,
                timeout_ms = timeout.as_millis() as u64,
                "Search tool timed out, killing process"
            );
            Err(AdapterError::Timeout {
                program: executable.program.clone(),
                timeout,
            })
        }
    }
}
