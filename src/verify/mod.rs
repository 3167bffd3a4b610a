//! End-to-end verification of tool calls against known ground truth.
//!
//! A [`VerificationCase`] pairs a tool call with the findings it should
//! produce in a corpus. The [`Verifier`] runs each call, grades and rewards
//! it, and collects a [`VerificationReport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::adapters::{ExecutionContext, ToolRunner};
use crate::config::GymConfig;
use crate::error::VerifyError;
use crate::finding::Finding;
use crate::grader::grade;
use crate::reward::{compute_reward_from_grade, RewardResult};
use crate::tool_call::{SchemaValidator, ToolCallSpec, ToolCallValidator};

/// One tool call with its expected findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCase {
    pub id: String,
    pub tool_call: ToolCallSpec,
    #[serde(default)]
    pub ground_truth: Vec<Finding>,
    /// Directory the tool runs in.
    pub corpus_root: PathBuf,
}

impl VerificationCase {
    pub fn new(
        id: impl Into<String>,
        tool_call: ToolCallSpec,
        ground_truth: Vec<Finding>,
        corpus_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_call,
            ground_truth,
            corpus_root: corpus_root.into(),
        }
    }

    /// Checks that the case can be graded: it needs at least one expected
    /// finding and a tool call that `validator` accepts.
    pub fn validate(&self, validator: &dyn ToolCallValidator) -> Result<(), VerifyError> {
        if self.ground_truth.is_empty() {
            return Err(VerifyError::EmptyGroundTruth {
                id: self.id.clone(),
            });
        }
        validator
            .validate(&self.tool_call)
            .map_err(|source| VerifyError::InvalidToolCall {
                id: self.id.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Loads cases from a JSON array file.
///
/// Relative corpus roots are resolved against the file's directory.
pub fn load_cases(path: &Path) -> Result<Vec<VerificationCase>, VerifyError> {
    let content = std::fs::read_to_string(path).map_err(|source| VerifyError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut cases: Vec<VerificationCase> = serde_json::from_str(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for case in &mut cases {
        if case.corpus_root.is_relative() {
            case.corpus_root = base.join(&case.corpus_root);
        }
    }

    info!(path = %path.display(), cases = cases.len(), "Loaded verification cases");
    Ok(cases)
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub case_id: String,
    /// Whether the tool call ran without failure.
    pub ok: bool,
    pub span_f1: f64,
    pub file_overlap: f64,
    pub num_predicted: usize,
    pub num_ground_truth: usize,
    /// Absent when the call never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardResult>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CaseReport {
    fn not_run(case: &VerificationCase, error: String) -> Self {
        Self {
            case_id: case.id.clone(),
            ok: false,
            span_f1: 0.0,
            file_overlap: 0.0,
            num_predicted: 0,
            num_ground_truth: case.ground_truth.len(),
            reward: None,
            errors: vec![error],
        }
    }

    /// A case passes when its call ran and its span F1 reaches `min_f1`.
    pub fn passed(&self, min_f1: f64) -> bool {
        self.ok && self.span_f1 >= min_f1
    }
}

/// Summary of a batch of cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub min_f1: f64,
    pub results: Vec<CaseReport>,
}

impl VerificationReport {
    pub fn from_results(results: Vec<CaseReport>, min_f1: f64) -> Self {
        let passed = results.iter().filter(|r| r.passed(min_f1)).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            min_f1,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// One-line summary such as `passed=3/4, failed=1, min_f1=0.95`.
    pub fn summary(&self) -> String {
        format!(
            "passed={}/{}, failed={}, min_f1={}",
            self.passed, self.total, self.failed, self.min_f1
        )
    }

    /// Renders the report with one PASS/FAIL line per case.
    pub fn render(&self) -> String {
        let mut lines = vec!["Verification Report".to_string(), self.summary()];
        for result in &self.results {
            let passed = result.passed(self.min_f1);
            lines.push(format!(
                "- {}: {}  F1={:.3}  IoU={:.3} pred={} gt={}",
                result.case_id,
                if passed { "PASS" } else { "FAIL" },
                result.span_f1,
                result.file_overlap,
                result.num_predicted,
                result.num_ground_truth
            ));
            if !passed && !result.errors.is_empty() {
                lines.push(format!("  errors: {}", result.errors.join("; ")));
            }
        }
        lines.join("\n")
    }
}

/// Runs verification cases with the configured tools.
pub struct Verifier {
    config: GymConfig,
    runner: ToolRunner,
    validator: Arc<dyn ToolCallValidator>,
}

impl Verifier {
    pub fn new(config: GymConfig) -> Self {
        Self {
            runner: ToolRunner::from_config(&config),
            config,
            validator: Arc::new(SchemaValidator::new()),
        }
    }

    /// Replaces the tool-call validator.
    pub fn with_validator(mut self, validator: Arc<dyn ToolCallValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    /// Runs, grades and rewards one case.
    ///
    /// Cases that fail [`VerificationCase::validate`] are reported as failed
    /// without running the tool.
    pub async fn verify_case(&self, case: &VerificationCase) -> CaseReport {
        if let Err(e) = case.validate(self.validator.as_ref()) {
            warn!(case = %case.id, error = %e, "Rejected verification case");
            return CaseReport::not_run(case, e.to_string());
        }
        if !case.corpus_root.is_dir() {
            warn!(
                case = %case.id,
                root = %case.corpus_root.display(),
                "Corpus directory does not exist"
            );
            return CaseReport::not_run(
                case,
                format!("Corpus directory does not exist: {}", case.corpus_root.display()),
            );
        }

        let ctx = ExecutionContext::new(&case.corpus_root).with_timeout(self.config.timeout);
        let output = self
            .runner
            .execute_spec(&case.tool_call, self.validator.as_ref(), &ctx)
            .await;

        let grade = grade(&output.findings, &case.ground_truth, self.config.tolerance);
        let error_flag = if output.ok { 0.0 } else { 1.0 };
        let reward = compute_reward_from_grade(
            self.validator.as_ref(),
            &grade,
            &case.tool_call,
            &self.config.weights,
            error_flag,
        );

        let report = CaseReport {
            case_id: case.id.clone(),
            ok: output.ok,
            span_f1: grade.span_metrics.f1,
            file_overlap: grade.file_overlap,
            num_predicted: grade.num_predicted,
            num_ground_truth: grade.num_ground_truth,
            reward: Some(reward),
            errors: if output.ok {
                Vec::new()
            } else {
                vec![output.raw_error]
            },
        };

        info!(
            case = %case.id,
            passed = report.passed(self.config.min_f1),
            f1 = report.span_f1,
            reward = reward.total,
            "Verified case"
        );
        report
    }

    /// Runs all cases, at most `max_concurrent` at a time. Results keep the
    /// input order.
    pub async fn verify_all(&self, cases: &[VerificationCase]) -> VerificationReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let futures = cases.iter().map(|case| {
            let semaphore = semaphore.clone();
            async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = semaphore.acquire().await.ok();
                self.verify_case(case).await
            }
        });
        let results = futures::future::join_all(futures).await;

        let report = VerificationReport::from_results(results, self.config.min_f1);
        info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            "Verification finished"
        );
        report
    }
}
