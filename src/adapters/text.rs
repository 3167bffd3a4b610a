//! Text (ripgrep) search adapter.
//!
//! ripgrep's `--json` mode prints one tagged record per line: `begin`,
//! `match`, `context`, `end` and `summary`. Only `match` and `context`
//! records carry findings; the rest are ignored.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{
    finish, process::run_process, AdapterOutput, ExecutionContext, Executable, ParsedOutput,
    SearchAdapter,
};
use crate::error::AdapterError;
use crate::finding::Finding;
use crate::pattern::requires_extended_engine;
use crate::tool_call::{TextSearchArgs, ToolName};

/// Runs `rg --json [flags] -e <pattern> -- [paths...]`.
#[derive(Debug, Clone)]
pub struct TextSearchAdapter {
    executable: Executable,
}

impl Default for TextSearchAdapter {
    fn default() -> Self {
        Self::new(Executable::new(ToolName::TextSearch.default_program()))
    }
}

impl TextSearchAdapter {
    pub fn new(executable: Executable) -> Self {
        Self { executable }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }
}

#[async_trait]
impl SearchAdapter for TextSearchAdapter {
    type Args = TextSearchArgs;

    fn tool(&self) -> ToolName {
        ToolName::TextSearch
    }

    fn build_args(&self, args: &TextSearchArgs) -> Vec<String> {
        let mut argv = vec!["--json".to_string()];
        if args.pcre2 {
            argv.push("-P".to_string());
        }
        // -s: case sensitive, -S: smart case
        argv.push(if args.case_sensitive { "-s" } else { "-S" }.to_string());
        for file_type in args.file_types.iter().flatten() {
            argv.push("-t".to_string());
            argv.push(file_type.clone());
        }
        if let Some(n) = args.context_lines {
            argv.push("-C".to_string());
            argv.push(n.to_string());
        }
        // -e keeps patterns that start with '-' from being read as flags.
        argv.push("-e".to_string());
        argv.push(args.pattern.clone());
        if let Some(paths) = &args.paths {
            argv.push("--".to_string());
            argv.extend(paths.iter().cloned());
        }
        argv
    }

    async fn run(&self, args: &TextSearchArgs, ctx: &ExecutionContext) -> AdapterOutput {
        if !args.pcre2 {
            let verdict = requires_extended_engine(&args.pattern);
            if verdict.requires_extended {
                warn!(
                    pattern = %args.pattern,
                    reason = %verdict.reason,
                    "Pattern needs PCRE2 but pcre2 is not set"
                );
            }
        }

        let argv = self.build_args(args);
        match run_process(&self.executable, &argv, ctx.working_dir.as_deref(), ctx.timeout).await
        {
            Ok(process) => {
                let parsed = parse_output(&process.stdout, args.context_lines.unwrap_or(0));
                finish(self.tool(), &self.executable.program, process, parsed)
            }
            Err(e) => AdapterOutput::from_error(&e),
        }
    }
}

/// Text field that ripgrep prints either as `{"text": ..}` or, for invalid
/// UTF-8, as base64 `{"bytes": ..}`. Only the text form is used.
#[derive(Debug, Deserialize)]
struct RgData {
    text: Option<String>,
}

impl RgData {
    fn into_text(self) -> Option<String> {
        self.text
    }
}

#[derive(Debug, Deserialize)]
struct RgSubmatch {
    #[serde(rename = "match")]
    matched: RgData,
    start: u32,
    end: u32,
}

#[derive(Debug, Deserialize)]
struct RgLine {
    path: RgData,
    lines: Option<RgData>,
    line_number: Option<u32>,
    #[serde(default)]
    submatches: Vec<RgSubmatch>,
}

/// The most recent match, for attaching trailing context.
struct LastMatch {
    path: String,
    line: u32,
    first_finding: usize,
}

fn strip_newline(line: String) -> String {
    line.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string()
}

/// Parses ripgrep `--json` output.
///
/// Each submatch becomes one finding with a 1-based start column and an
/// inclusive end column (byte offsets). A match record without submatches
/// becomes one whole-line finding. When `context_lines` is non-zero,
/// `context` records within that distance of a match are attached to it.
/// Lines that are not JSON, and match records missing a UTF-8 path or line
/// number, are counted as skipped. Fails when the output is non-empty but
/// no line is a tagged ripgrep record.
pub fn parse_output(stdout: &str, context_lines: u32) -> Result<ParsedOutput, AdapterError> {
    let mut findings: Vec<Finding> = Vec::new();
    let mut skipped = 0;
    let mut records = 0;
    let mut first_error: Option<String> = None;
    let mut last_match: Option<LastMatch> = None;
    let mut pending_before: Vec<(String, u32, String)> = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
                skipped += 1;
                continue;
            }
        };
        let Some(kind) = record.get("type").and_then(Value::as_str) else {
            first_error.get_or_insert_with(|| format!("record without a type tag: {line}"));
            skipped += 1;
            continue;
        };
        records += 1;
        if kind != "match" && kind != "context" {
            continue;
        }
        let Some(data) = record.get("data").cloned() else {
            skipped += 1;
            continue;
        };
        let parsed = serde_json::from_value::<RgLine>(data).ok().and_then(|rg| {
            let path = rg.path.into_text()?;
            let line_number = rg.line_number?;
            Some((path, line_number, rg.lines, rg.submatches))
        });
        let Some((path, line_number, lines, submatches)) = parsed else {
            if kind == "match" {
                skipped += 1;
            }
            continue;
        };
        let line_text = lines.and_then(RgData::into_text).map(strip_newline);

        if kind == "context" {
            if context_lines == 0 {
                continue;
            }
            let text = line_text.unwrap_or_default();
            if let Some(last) = &last_match {
                if last.path == path
                    && line_number > last.line
                    && line_number - last.line <= context_lines
                {
                    for finding in &mut findings[last.first_finding..] {
                        finding
                            .context_after
                            .get_or_insert_with(Vec::new)
                            .push(text.clone());
                    }
                }
            }
            pending_before.push((path, line_number, text));
            continue;
        }

        let before: Vec<String> = pending_before
            .drain(..)
            .filter(|(p, n, _)| {
                *p == path && *n < line_number && line_number - n <= context_lines
            })
            .map(|(_, _, text)| text)
            .collect();

        let first_finding = findings.len();
        if submatches.is_empty() {
            let mut finding = Finding::new(path.clone(), line_number);
            if let Some(text) = line_text {
                finding = finding.with_text(text);
            }
            findings.push(finding.with_context(before, Vec::new()));
        } else {
            for sub in submatches {
                let mut finding = Finding::new(path.clone(), line_number)
                    .with_column(sub.start.saturating_add(1))
                    .with_end(line_number, Some(sub.end.max(sub.start.saturating_add(1))));
                if let Some(text) = sub.matched.into_text() {
                    finding = finding.with_text(text);
                }
                findings.push(finding.with_context(before.clone(), Vec::new()));
            }
        }
        last_match = Some(LastMatch {
            path,
            line: line_number,
            first_finding,
        });
    }

    if records == 0 {
        if let Some(message) = first_error {
            return Err(AdapterError::OutputParse {
                tool: ToolName::TextSearch.to_string(),
                message,
            });
        }
    }
    Ok(ParsedOutput { findings, skipped })
}
