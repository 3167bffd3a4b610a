//! Adapters that run the external search tools and normalize their output.
//!
//! Each adapter knows how to:
//! 1. Build the tool's argument vector from typed arguments
//! 2. Run the tool under a deadline
//! 3. Parse the tool-native output into [`Finding`]s
//!
//! Failures never escape as errors. Every call returns an [`AdapterOutput`]
//! whose `ok` flag and [`FailureKind`] say what went wrong.

pub mod process;
pub mod structural;
pub mod text;

pub use process::{run_process, Executable, ProcessOutput};
pub use structural::StructuralSearchAdapter;
pub use text::TextSearchAdapter;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GymConfig;
use crate::error::{AdapterError, FailureKind, ToolCallValidationError};
use crate::finding::Finding;
use crate::tool_call::{ToolCall, ToolCallSpec, ToolCallValidator, ToolName};

/// Exit code reported when a call hits its deadline.
pub const EXIT_CODE_TIMEOUT: i32 = 124;
/// Exit code reported when the tool binary cannot be launched.
pub const EXIT_CODE_NOT_FOUND: i32 = 127;
/// Exit code reported when no process ran or it died without a code.
pub const EXIT_CODE_UNKNOWN: i32 = -1;

/// Default deadline for one tool call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how long a tool call may run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Directory the tool runs in; relative search paths resolve against it.
    pub working_dir: Option<PathBuf>,
    /// Deadline for the whole call.
    pub timeout: Duration,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExecutionContext {
    /// Creates a context rooted at `working_dir` with the default deadline.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Normalized result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterOutput {
    pub ok: bool,
    pub findings: Vec<Finding>,
    pub raw_output: String,
    pub raw_error: String,
    pub exit_code: i32,
    /// Set whenever `ok` is false.
    pub failure: Option<FailureKind>,
    /// Output records that were malformed and dropped.
    pub skipped_records: usize,
}

impl AdapterOutput {
    /// A call that never produced process output.
    pub fn from_error(err: &AdapterError) -> Self {
        let exit_code = match err {
            AdapterError::Timeout { .. } => EXIT_CODE_TIMEOUT,
            AdapterError::ExecutableNotFound { .. } => EXIT_CODE_NOT_FOUND,
            AdapterError::UnexpectedExitCode { code, .. } => *code,
            _ => EXIT_CODE_UNKNOWN,
        };
        Self {
            ok: false,
            findings: Vec::new(),
            raw_output: String::new(),
            raw_error: err.to_string(),
            exit_code,
            failure: Some(err.kind()),
            skipped_records: 0,
        }
    }

    /// A call rejected before any process was started.
    pub fn invalid_call(err: &ToolCallValidationError) -> Self {
        Self {
            ok: false,
            findings: Vec::new(),
            raw_output: String::new(),
            raw_error: err.to_string(),
            exit_code: EXIT_CODE_UNKNOWN,
            failure: Some(FailureKind::InvalidToolCall),
            skipped_records: 0,
        }
    }

    /// Splits into `(ok, findings, raw_output, raw_error, exit_code)`.
    pub fn into_parts(self) -> (bool, Vec<Finding>, String, String, i32) {
        (
            self.ok,
            self.findings,
            self.raw_output,
            self.raw_error,
            self.exit_code,
        )
    }
}

/// Findings parsed from a tool's stdout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub findings: Vec<Finding>,
    pub skipped: usize,
}

/// Combines a finished process with its parse result.
///
/// Exit codes 0 and 1 (matches / no matches) are success. Any other code
/// fails the call but keeps whatever findings were parsed.
pub(crate) fn finish(
    tool: ToolName,
    program: &str,
    process: ProcessOutput,
    parsed: Result<ParsedOutput, AdapterError>,
) -> AdapterOutput {
    let ProcessOutput {
        exit_code,
        stdout,
        stderr,
        duration,
    } = process;

    let (findings, skipped, parse_error) = match parsed {
        Ok(parsed) => (parsed.findings, parsed.skipped, None),
        Err(e) => (Vec::new(), 0, Some(e)),
    };

    if skipped > 0 {
        warn!(tool = %tool, skipped, "Dropped malformed output records");
    }

    let (ok, failure, raw_error) = if !matches!(exit_code, 0 | 1) {
        let err = AdapterError::UnexpectedExitCode {
            program: program.to_string(),
            code: exit_code,
        };
        (false, Some(err.kind()), join_error(&err, &stderr))
    } else if let Some(err) = parse_error {
        (false, Some(err.kind()), join_error(&err, &stderr))
    } else {
        (true, None, stderr)
    };

    info!(
        tool = %tool,
        ok,
        exit_code,
        findings = findings.len(),
        duration_ms = duration.as_millis() as u64,
        "Search tool finished"
    );

    AdapterOutput {
        ok,
        findings,
        raw_output: stdout,
        raw_error,
        exit_code,
        failure,
        skipped_records: skipped,
    }
}

fn join_error(err: &AdapterError, stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        err.to_string()
    } else {
        format!("{}\n{}", err, stderr)
    }
}

/// A search tool adapter.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Typed arguments this adapter accepts.
    type Args: Send + Sync;

    /// The tool this adapter runs.
    fn tool(&self) -> ToolName;

    /// Builds the tool-specific arguments (after any leading args).
    fn build_args(&self, args: &Self::Args) -> Vec<String>;

    /// Runs one search.
    async fn run(&self, args: &Self::Args, ctx: &ExecutionContext) -> AdapterOutput;
}

/// Dispatches tool calls to the matching adapter.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    structural: StructuralSearchAdapter,
    text: TextSearchAdapter,
}

impl ToolRunner {
    pub fn new(structural: StructuralSearchAdapter, text: TextSearchAdapter) -> Self {
        Self { structural, text }
    }

    /// Builds adapters for the executables named in `config`.
    pub fn from_config(config: &GymConfig) -> Self {
        Self {
            structural: StructuralSearchAdapter::new(config.ast_grep_executable.clone()),
            text: TextSearchAdapter::new(config.ripgrep_executable.clone()),
        }
    }

    pub fn structural(&self) -> &StructuralSearchAdapter {
        &self.structural
    }

    pub fn text(&self) -> &TextSearchAdapter {
        &self.text
    }

    /// Runs a validated call.
    pub async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> AdapterOutput {
        match call {
            ToolCall::StructuralSearch(args) => self.structural.run(args, ctx).await,
            ToolCall::TextSearch(args) => self.text.run(args, ctx).await,
        }
    }

    /// Validates a raw call, then runs it. Rejected calls are reported with
    /// [`FailureKind::InvalidToolCall`] and start no process.
    pub async fn execute_spec(
        &self,
        spec: &ToolCallSpec,
        validator: &dyn ToolCallValidator,
        ctx: &ExecutionContext,
    ) -> AdapterOutput {
        match validator.validate(spec) {
            Ok(call) => self.execute(&call, ctx).await,
            Err(e) => {
                warn!(tool = %spec.name, error = %e, "Rejected tool call");
                AdapterOutput::invalid_call(&e)
            }
        }
    }
}
