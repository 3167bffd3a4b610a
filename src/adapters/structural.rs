//! Structural (ast-grep) search adapter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    finish, process::run_process, AdapterOutput, ExecutionContext, Executable, ParsedOutput,
    SearchAdapter,
};
use crate::error::AdapterError;
use crate::finding::Finding;
use crate::tool_call::{StructuralSearchArgs, ToolName};

/// Runs `ast-grep -p <pattern> -l <lang> --json [paths...]`.
#[derive(Debug, Clone)]
pub struct StructuralSearchAdapter {
    executable: Executable,
}

impl Default for StructuralSearchAdapter {
    fn default() -> Self {
        Self::new(Executable::new(ToolName::StructuralSearch.default_program()))
    }
}

impl StructuralSearchAdapter {
    pub fn new(executable: Executable) -> Self {
        Self { executable }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }
}

#[async_trait]
impl SearchAdapter for StructuralSearchAdapter {
    type Args = StructuralSearchArgs;

    fn tool(&self) -> ToolName {
        ToolName::StructuralSearch
    }

    fn build_args(&self, args: &StructuralSearchArgs) -> Vec<String> {
        let mut argv = vec![
            "-p".to_string(),
            args.pattern.clone(),
            "-l".to_string(),
            args.language.as_str().to_string(),
            "--json".to_string(),
        ];
        if let Some(paths) = &args.paths {
            argv.extend(paths.iter().cloned());
        }
        argv
    }

    async fn run(&self, args: &StructuralSearchArgs, ctx: &ExecutionContext) -> AdapterOutput {
        let argv = self.build_args(args);
        match run_process(&self.executable, &argv, ctx.working_dir.as_deref(), ctx.timeout).await
        {
            Ok(process) => {
                let parsed = parse_output(&process.stdout);
                finish(self.tool(), &self.executable.program, process, parsed)
            }
            Err(e) => AdapterOutput::from_error(&e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AstGrepMatch {
    file: Option<String>,
    path: Option<String>,
    text: Option<String>,
    range: Option<AstGrepRange>,
}

#[derive(Debug, Default, Deserialize)]
struct AstGrepRange {
    start: Option<AstGrepPosition>,
    end: Option<AstGrepPosition>,
}

/// Zero-based position as printed by ast-grep.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct AstGrepPosition {
    line: Option<u32>,
    column: Option<u32>,
}

impl AstGrepMatch {
    /// Converts to a finding with 1-based positions. The end column is
    /// exclusive and zero-based, which is the same number as the inclusive
    /// 1-based last column.
    fn into_finding(self) -> Option<Finding> {
        let path = self.file.or(self.path).filter(|p| !p.is_empty())?;
        let range = self.range.unwrap_or_default();
        let start = range.start.unwrap_or_default();

        let mut finding = Finding::new(path, start.line.map_or(1, |l| l.saturating_add(1)));
        if let Some(column) = start.column {
            finding = finding.with_column(column.saturating_add(1));
        }
        if let Some(end) = range.end {
            if let Some(end_line) = end.line {
                finding = finding.with_end(end_line.saturating_add(1), end.column);
            }
        }
        if let Some(text) = self.text {
            finding = finding.with_text(text);
        }
        Some(finding)
    }
}

/// Parses ast-grep `--json` output.
///
/// Accepts a single JSON array, or falls back to one JSON value per line
/// (as `--json=stream` prints). Elements without a file path and lines that
/// are not JSON objects are counted as skipped. Fails when no line holds a
/// match object.
pub fn parse_output(stdout: &str) -> Result<ParsedOutput, AdapterError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(ParsedOutput::default());
    }

    let mut skipped = 0;
    let values = match serde_json::from_str::<Vec<Value>>(trimmed) {
        Ok(values) => values,
        Err(strict_err) => {
            debug!(error = %strict_err, "ast-grep output is not a single array, parsing per line");
            let mut values = Vec::new();
            let mut parsed_lines = 0;
            for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match serde_json::from_str::<Value>(line) {
                    Ok(Value::Array(items)) if items.iter().any(Value::is_object) => {
                        parsed_lines += 1;
                        values.extend(items);
                    }
                    Ok(value @ Value::Object(_)) => {
                        parsed_lines += 1;
                        values.push(value);
                    }
                    // Stray scalars are not match records.
                    Ok(_) | Err(_) => skipped += 1,
                }
            }
            if parsed_lines == 0 {
                return Err(AdapterError::OutputParse {
                    tool: ToolName::StructuralSearch.to_string(),
                    message: strict_err.to_string(),
                });
            }
            values
        }
    };

    let mut findings = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<AstGrepMatch>(value)
            .ok()
            .and_then(AstGrepMatch::into_finding)
        {
            Some(finding) => findings.push(finding),
            None => skipped += 1,
        }
    }

    Ok(ParsedOutput { findings, skipped })
}
