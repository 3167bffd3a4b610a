//! Scoring of predicted findings against ground truth.
//!
//! Two views are computed:
//! - file-level overlap (Jaccard over unique paths)
//! - span-level precision/recall/F1 from a maximum one-to-one matching
//!
//! Grading is pure and deterministic: the same inputs always produce the
//! same [`GradeResult`].

pub mod matching;

pub use matching::maximum_span_matching;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::finding::{Finding, Span};

/// Span-level confusion counts and derived scores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpanMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    #[serde(rename = "tp")]
    pub true_positives: usize,
    #[serde(rename = "fp")]
    pub false_positives: usize,
    #[serde(rename = "fn")]
    pub false_negatives: usize,
}

impl SpanMetrics {
    /// Derives precision, recall and F1 from confusion counts. Each ratio is
    /// 0.0 when its denominator is zero.
    pub fn from_counts(
        true_positives: usize,
        false_positives: usize,
        false_negatives: usize,
    ) -> Self {
        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, true_positives + false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            true_positives,
            false_positives,
            false_negatives,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Jaccard similarity of the sets of paths in `predicted` and `ground_truth`.
///
/// Two empty sets agree perfectly (1.0); one empty set scores 0.0.
pub fn compute_file_overlap(predicted: &[Finding], ground_truth: &[Finding]) -> f64 {
    let predicted_files: HashSet<&str> = predicted.iter().map(|f| f.path.as_str()).collect();
    let truth_files: HashSet<&str> = ground_truth.iter().map(|f| f.path.as_str()).collect();

    if predicted_files.is_empty() && truth_files.is_empty() {
        return 1.0;
    }
    if predicted_files.is_empty() || truth_files.is_empty() {
        return 0.0;
    }

    let intersection = predicted_files.intersection(&truth_files).count();
    let union = predicted_files.union(&truth_files).count();
    intersection as f64 / union as f64
}

/// Matches predicted spans to ground-truth spans one-to-one.
///
/// Two spans can pair when they share a path and their line ranges overlap
/// after each is widened by `tolerance` lines. The pairing is a maximum
/// matching, so the result does not depend on input order. With both inputs
/// empty every score is 0.0.
pub fn compute_span_match(
    predicted: &[Finding],
    ground_truth: &[Finding],
    tolerance: u32,
) -> SpanMetrics {
    let predicted_spans: Vec<Span<'_>> = predicted.iter().map(Finding::span).collect();
    let truth_spans: Vec<Span<'_>> = ground_truth.iter().map(Finding::span).collect();

    let tp = maximum_span_matching(&predicted_spans, &truth_spans, tolerance);
    let metrics = SpanMetrics::from_counts(tp, predicted.len() - tp, ground_truth.len() - tp);

    debug!(
        tp = metrics.true_positives,
        fp = metrics.false_positives,
        fn_ = metrics.false_negatives,
        tolerance,
        "Computed span match"
    );
    metrics
}

/// Full grade of one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub file_overlap: f64,
    pub span_metrics: SpanMetrics,
    pub num_predicted: usize,
    pub num_ground_truth: usize,
}

impl GradeResult {
    /// Renders a human-readable report.
    pub fn report(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.span_metrics;
        writeln!(f, "Grade report")?;
        writeln!(f, "  predicted findings:    {}", self.num_predicted)?;
        writeln!(f, "  ground truth findings: {}", self.num_ground_truth)?;
        writeln!(f, "  file overlap (IoU):    {:.3}", self.file_overlap)?;
        writeln!(f, "  span precision:        {:.3}", m.precision)?;
        writeln!(f, "  span recall:           {:.3}", m.recall)?;
        writeln!(f, "  span f1:               {:.3}", m.f1)?;
        write!(
            f,
            "  tp / fp / fn:          {} / {} / {}",
            m.true_positives, m.false_positives, m.false_negatives
        )
    }
}

/// Grades `predicted` against `ground_truth`.
pub fn grade(predicted: &[Finding], ground_truth: &[Finding], tolerance: u32) -> GradeResult {
    GradeResult {
        file_overlap: compute_file_overlap(predicted, ground_truth),
        span_metrics: compute_span_match(predicted, ground_truth, tolerance),
        num_predicted: predicted.len(),
        num_ground_truth: ground_truth.len(),
    }
}
