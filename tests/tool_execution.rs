//! Integration tests for tool execution, grading and verification.
//!
//! Most tests stand in for ast-grep and ripgrep with `sh -c` scripts that
//! print canned output, so they run without either tool installed.
//! Tests against the real binaries are ignored by default.
//! Run with: cargo test --test tool_execution -- --ignored
#![cfg(unix)]

use std::time::{Duration, Instant};

use codesearch_gym::{
    compute_reward, AdapterOutput, ExecutionContext, Executable, FailureKind, Finding, GymConfig,
    Language, RewardWeights, SchemaValidator, SearchAdapter, StructuralSearchAdapter,
    StructuralSearchArgs, TextSearchAdapter, TextSearchArgs, ToolCallSpec, ToolRunner,
    VerificationCase, Verifier,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fake tool that runs `script`; the tool's own arguments land in `$@`.
fn fake_tool(script: &str) -> Executable {
    Executable::new("sh").with_leading_args(["-c", script, "sh"])
}

/// A fake tool that prints each line of `lines` and exits with `code`.
fn printing_tool(lines: &[String], code: i32) -> Executable {
    let quoted: Vec<String> = lines.iter().map(|l| format!("'{}'", l)).collect();
    fake_tool(&format!("printf '%s\\n' {}; exit {}", quoted.join(" "), code))
}

fn rg_match(path: &str, line: u32, text: &str, start: u32, end: u32) -> String {
    json!({
        "type": "match",
        "data": {
            "path": {"text": path},
            "lines": {"text": format!("{text}\n")},
            "line_number": line,
            "absolute_offset": 0,
            "submatches": [{
                "match": {"text": &text[start as usize..end as usize]},
                "start": start,
                "end": end
            }]
        }
    })
    .to_string()
}

fn ctx() -> ExecutionContext {
    ExecutionContext::default().with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn test_structural_adapter_parses_fake_output() {
    init_tracing();
    let payload = json!([
        {"file": "src/App.js", "text": "useEffect(() => {}, [])",
         "range": {"start": {"line": 3, "column": 2}, "end": {"line": 3, "column": 25}}}
    ])
    .to_string();
    let adapter = StructuralSearchAdapter::new(printing_tool(&[payload], 0));
    let args = StructuralSearchArgs::new("useEffect($$$)", Language::Javascript);

    let out = adapter.run(&args, &ctx()).await;
    assert!(out.ok, "{out:?}");
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].path, "src/App.js");
    assert_eq!(out.findings[0].line, 4);
    assert_eq!(out.findings[0].column, Some(3));
}

#[tokio::test]
async fn test_structural_adapter_receives_arguments() {
    // Echo the argument vector back as the single match's text.
    let script = r#"printf '[{"file": "args.txt", "text": "%s"}]' "$*""#;
    let adapter = StructuralSearchAdapter::new(fake_tool(script));
    let args =
        StructuralSearchArgs::new("foo($A)", Language::Python).with_paths(vec!["pkg".into()]);

    let out = adapter.run(&args, &ctx()).await;
    assert!(out.ok, "{out:?}");
    assert_eq!(out.findings[0].text.as_deref(), Some("-p foo($A) -l python --json pkg"));
}

#[tokio::test]
async fn test_structural_adapter_garbage_output() {
    let adapter = StructuralSearchAdapter::new(fake_tool("printf 'definitely not json'"));
    let out = adapter
        .run(&StructuralSearchArgs::new("x", Language::Rust), &ctx())
        .await;
    assert!(!out.ok);
    assert_eq!(out.failure, Some(FailureKind::OutputParseError));
    assert!(out.findings.is_empty());
    assert_eq!(out.raw_output, "definitely not json");
}

#[tokio::test]
async fn test_structural_adapter_stray_scalar_is_parse_error() {
    let lines = vec!["Error: bad pattern".to_string(), "0".to_string()];
    let adapter = StructuralSearchAdapter::new(printing_tool(&lines, 0));
    let out = adapter
        .run(&StructuralSearchArgs::new("x", Language::Rust), &ctx())
        .await;
    assert!(!out.ok);
    assert_eq!(out.failure, Some(FailureKind::OutputParseError));
    assert!(out.findings.is_empty());
}

#[tokio::test]
async fn test_text_adapter_plain_text_output_is_parse_error() {
    let lines = vec![
        "rg: unrecognized output".to_string(),
        "not json either".to_string(),
    ];
    let adapter = TextSearchAdapter::new(printing_tool(&lines, 0));
    let out = adapter.run(&TextSearchArgs::new("TODO"), &ctx()).await;
    assert!(!out.ok);
    assert_eq!(out.exit_code, 0);
    assert_eq!(out.failure, Some(FailureKind::OutputParseError));
    assert!(out.findings.is_empty());
}

#[tokio::test]
async fn test_text_adapter_no_matches_is_ok() {
    let adapter = TextSearchAdapter::new(printing_tool(&[], 1));
    let out = adapter.run(&TextSearchArgs::new("absent"), &ctx()).await;
    assert!(out.ok);
    assert_eq!(out.exit_code, 1);
    assert!(out.findings.is_empty());
}

#[tokio::test]
async fn test_text_adapter_exit_two_keeps_findings() {
    let lines = vec![
        rg_match("a.py", 3, "TODO: fix", 0, 4),
        "not json at all".to_string(),
    ];
    let adapter = TextSearchAdapter::new(printing_tool(&lines, 2));
    let out = adapter.run(&TextSearchArgs::new("TODO"), &ctx()).await;

    assert!(!out.ok);
    assert_eq!(out.failure, Some(FailureKind::UnexpectedExitCode));
    assert_eq!(out.exit_code, 2);
    assert_eq!(out.skipped_records, 1);
    assert_eq!(
        out.findings,
        vec![Finding::new("a.py", 3)
            .with_column(1)
            .with_end(3, Some(4))
            .with_text("TODO")]
    );
}

#[tokio::test]
async fn test_timeout_kills_slow_tool() {
    init_tracing();
    let adapter = TextSearchAdapter::new(fake_tool("exec sleep 30"));
    let ctx = ExecutionContext::default().with_timeout(Duration::from_millis(50));

    let start = Instant::now();
    let out = adapter.run(&TextSearchArgs::new("x"), &ctx).await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!out.ok);
    assert_eq!(out.failure, Some(FailureKind::Timeout));
    assert_eq!(out.exit_code, 124);
    assert!(out.findings.is_empty());
    assert!(out.raw_error.starts_with("timeout"));
}

#[tokio::test]
async fn test_missing_executable() {
    let adapter = StructuralSearchAdapter::new(Executable::new("codesearch-gym-missing-tool"));
    let out = adapter
        .run(&StructuralSearchArgs::new("x", Language::Go), &ctx())
        .await;
    assert!(!out.ok);
    assert_eq!(out.failure, Some(FailureKind::ExecutableNotFound));
    assert_eq!(out.exit_code, 127);
}

#[tokio::test]
async fn test_runner_dispatches_by_tool_name() {
    let runner = ToolRunner::new(
        StructuralSearchAdapter::new(printing_tool(&["[]".to_string()], 0)),
        TextSearchAdapter::new(printing_tool(&[rg_match("b.rs", 7, "fn main", 0, 2)], 0)),
    );
    let validator = SchemaValidator::new();

    let text = ToolCallSpec::new("ripgrep_search", json!({"pattern": "fn"}));
    let out = runner.execute_spec(&text, &validator, &ctx()).await;
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].path, "b.rs");

    let structural = ToolCallSpec::new(
        "structural_search",
        json!({"pattern": "fn $F() {}", "language": "rust"}),
    );
    let out = runner.execute_spec(&structural, &validator, &ctx()).await;
    assert!(out.ok);
    assert!(out.findings.is_empty());
}

#[tokio::test]
async fn test_findings_flow_into_reward() {
    let adapter = TextSearchAdapter::new(printing_tool(
        &[
            rg_match("src/App.js", 4, "useEffect(() => {});", 0, 9),
            rg_match("src/utils.js", 2, "// TODO: useEffect cleanup", 9, 18),
        ],
        0,
    ));
    let out: AdapterOutput = adapter.run(&TextSearchArgs::new("useEffect"), &ctx()).await;
    assert!(out.ok);

    let truth = [Finding::new("src/App.js", 4)];
    let spec = ToolCallSpec::new("text_search", json!({"pattern": "useEffect"}));
    let error_flag = if out.ok { 0.0 } else { 1.0 };
    let weights = RewardWeights::default();
    let reward = compute_reward(&out.findings, &truth, &spec, 0, &weights, error_flag);

    assert_eq!(reward.parse, 1.0);
    assert!((reward.find - 2.0 / 3.0).abs() < 1e-9);
    assert!((reward.scope - 0.5).abs() < 1e-9);
    assert!((reward.effort - 0.01).abs() < 1e-9);
    assert_eq!(reward.pcre2_rule, 0.0);
}

#[tokio::test]
async fn test_verify_all_with_fake_tools() {
    init_tracing();
    let corpus = tempfile::tempdir().unwrap();
    let config = GymConfig::default()
        .with_max_concurrent(2)
        .with_timeout(Duration::from_secs(10))
        .with_ripgrep_executable(printing_tool(
            &[rg_match("src/App.js", 4, "useEffect(() => {});", 0, 9)],
            0,
        ))
        .with_ast_grep_executable(fake_tool("exit 3"));
    let verifier = Verifier::new(config);

    let cases = vec![
        VerificationCase::new(
            "text-hit",
            ToolCallSpec::new("text_search", json!({"pattern": "useEffect"})),
            vec![Finding::new("src/App.js", 4)],
            corpus.path(),
        ),
        VerificationCase::new(
            "structural-crash",
            ToolCallSpec::new("structural_search", json!({"pattern": "x", "language": "python"})),
            vec![Finding::new("a.py", 1)],
            corpus.path(),
        ),
        VerificationCase::new(
            "no-corpus",
            ToolCallSpec::new("text_search", json!({"pattern": "x"})),
            vec![Finding::new("a.py", 1)],
            corpus.path().join("missing"),
        ),
    ];

    let report = verifier.verify_all(&cases).await;
    assert_eq!((report.total, report.passed, report.failed), (3, 1, 2));

    let ids: Vec<&str> = report.results.iter().map(|r| r.case_id.as_str()).collect();
    assert_eq!(ids, vec!["text-hit", "structural-crash", "no-corpus"]);
    assert!(report.results[0].passed(report.min_f1));
    assert!(report.results[1].errors[0].contains("unexpected code 3"));

    let rendered = report.render();
    assert!(rendered.contains("- text-hit: PASS"));
    assert!(rendered.contains("- structural-crash: FAIL"));
    assert!(rendered.contains("- no-corpus: FAIL"));
}

#[tokio::test]
#[ignore] // Requires ripgrep on PATH
async fn test_real_ripgrep_finds_hook() {
    let corpus = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(corpus.path().join("src")).unwrap();
    std::fs::write(
        corpus.path().join("src/App.js"),
        "import React, { useEffect, useState } from 'react';\n\
         function App() {\n\
         \x20 const [n, setN] = useState(0);\n\
         \x20 useEffect(() => { console.log('mount'); }, []);\n\
         \x20 return <div>{n}</div>;\n\
         }\n",
    )
    .unwrap();

    let adapter = TextSearchAdapter::default();
    let args = TextSearchArgs::new(r"useEffect\(").case_sensitive(true);
    let out = adapter.run(&args, &ExecutionContext::new(corpus.path())).await;

    assert!(out.ok, "{out:?}");
    let truth = [Finding::new("src/App.js", 4)];
    let grade = codesearch_gym::grade(&out.findings, &truth, 0);
    assert!((grade.span_metrics.f1 - 1.0).abs() < 1e-9);
}

#[tokio::test]
#[ignore] // Requires ast-grep on PATH
async fn test_real_ast_grep_finds_hook() {
    let corpus = tempfile::tempdir().unwrap();
    std::fs::write(
        corpus.path().join("App.js"),
        "function App() {\n  useEffect(() => {}, []);\n}\n",
    )
    .unwrap();

    let adapter = StructuralSearchAdapter::default();
    let args = StructuralSearchArgs::new("useEffect($$$ARGS)", Language::Javascript);
    let out = adapter.run(&args, &ExecutionContext::new(corpus.path())).await;

    assert!(out.ok, "{out:?}");
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].line, 2);
}
