//! Scalar reward for one search tool call.
//!
//! The reward combines the grade of the call's findings with penalties for
//! noisy output, a missing PCRE2 flag and execution errors:
//!
//! ```text
//! total = α·R_parse + β·R_find + γ·R_scope
//!       − δ·R_effort − ζ·(R_pcre2_rule + R_errors)
//! ```
//!
//! A rejected call is usually charged twice: `R_parse` drops to 0 and the
//! failed execution sets `R_errors` to 1.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::finding::Finding;
use crate::grader::{grade, GradeResult};
use crate::pattern::requires_extended_engine;
use crate::tool_call::{SchemaValidator, ToolCallSpec, ToolCallValidator, ToolName};

/// Default weight of the parse term.
pub const DEFAULT_ALPHA: f64 = 0.2;
/// Default weight of the span F1 term.
pub const DEFAULT_BETA: f64 = 0.5;
/// Default weight of the file overlap term.
pub const DEFAULT_GAMMA: f64 = 0.2;
/// Default weight of the effort penalty.
pub const DEFAULT_DELTA: f64 = 0.05;
/// Default weight of the rule and error penalties.
pub const DEFAULT_ZETA: f64 = 0.5;
/// Default effort charged per false positive.
pub const DEFAULT_EFFORT_PER_FALSE_POSITIVE: f64 = 0.01;

/// Weights of the reward formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub zeta: f64,
    pub effort_per_false_positive: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            delta: DEFAULT_DELTA,
            zeta: DEFAULT_ZETA,
            effort_per_false_positive: DEFAULT_EFFORT_PER_FALSE_POSITIVE,
        }
    }
}

impl RewardWeights {
    /// All weights as `(name, value)` pairs, for validation and logging.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("delta", self.delta),
            ("zeta", self.zeta),
            ("effort_per_false_positive", self.effort_per_false_positive),
        ]
    }
}

/// Reward components and their weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardResult {
    /// 1.0 when the tool call passed validation.
    #[serde(rename = "R_parse")]
    pub parse: f64,
    /// Span F1 of the findings.
    #[serde(rename = "R_find")]
    pub find: f64,
    /// File overlap of the findings.
    #[serde(rename = "R_scope")]
    pub scope: f64,
    /// Effort charged for false positives.
    #[serde(rename = "R_effort")]
    pub effort: f64,
    /// 1.0 when a text search pattern needs PCRE2 but the flag was not set.
    #[serde(rename = "R_pcre2_rule")]
    pub pcre2_rule: f64,
    /// Error weight supplied by the caller, usually 1.0 for a failed call.
    #[serde(rename = "R_errors")]
    pub errors: f64,
    pub total: f64,
}

/// Computes the reward using the schema validator.
pub fn compute_reward(
    predicted: &[Finding],
    ground_truth: &[Finding],
    spec: &ToolCallSpec,
    tolerance: u32,
    weights: &RewardWeights,
    error_flag: f64,
) -> RewardResult {
    compute_reward_with(
        &SchemaValidator::new(),
        predicted,
        ground_truth,
        spec,
        tolerance,
        weights,
        error_flag,
    )
}

/// Computes the reward with a caller-supplied validator.
///
/// Never fails: a rejected tool call only zeroes `R_parse`.
pub fn compute_reward_with(
    validator: &dyn ToolCallValidator,
    predicted: &[Finding],
    ground_truth: &[Finding],
    spec: &ToolCallSpec,
    tolerance: u32,
    weights: &RewardWeights,
    error_flag: f64,
) -> RewardResult {
    let grade = grade(predicted, ground_truth, tolerance);
    compute_reward_from_grade(validator, &grade, spec, weights, error_flag)
}

/// Computes the reward from an existing grade of the findings.
///
/// `error_flag` is used as `R_errors` as given.
pub fn compute_reward_from_grade(
    validator: &dyn ToolCallValidator,
    grade: &GradeResult,
    spec: &ToolCallSpec,
    weights: &RewardWeights,
    error_flag: f64,
) -> RewardResult {
    let parse = if validator.is_valid(spec) { 1.0 } else { 0.0 };

    let find = grade.span_metrics.f1;
    let scope = grade.file_overlap;
    let effort = weights.effort_per_false_positive * grade.span_metrics.false_positives as f64;

    let pcre2_rule = if pcre2_rule_violated(spec) { 1.0 } else { 0.0 };
    let errors = error_flag;

    let total = weights.alpha * parse + weights.beta * find + weights.gamma * scope
        - weights.delta * effort
        - weights.zeta * (pcre2_rule + errors);

    debug!(
        tool = %spec.name,
        parse,
        find,
        scope,
        effort,
        pcre2_rule,
        errors,
        total,
        "Computed reward"
    );

    RewardResult {
        parse,
        find,
        scope,
        effort,
        pcre2_rule,
        errors,
        total,
    }
}

/// A text search whose pattern needs PCRE2 without the flag set.
fn pcre2_rule_violated(spec: &ToolCallSpec) -> bool {
    if spec.tool() != Some(ToolName::TextSearch) || spec.pcre2() {
        return false;
    }
    spec.pattern()
        .map(|pattern| requires_extended_engine(pattern).requires_extended)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolCallValidationError;
    use crate::tool_call::ToolCall;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn text_spec(pattern: &str, pcre2: bool) -> ToolCallSpec {
        ToolCallSpec::new("text_search", json!({"pattern": pattern, "pcre2": pcre2}))
    }

    fn reward(
        predicted: &[Finding],
        truth: &[Finding],
        spec: &ToolCallSpec,
        error_flag: f64,
    ) -> RewardResult {
        compute_reward(predicted, truth, spec, 0, &RewardWeights::default(), error_flag)
    }

    #[test]
    fn test_perfect_call() {
        let truth = [Finding::new("a.py", 3)];
        let r = reward(&truth, &truth, &text_spec("foo", false), 0.0);
        assert!(approx(r.parse, 1.0));
        assert!(approx(r.find, 1.0));
        assert!(approx(r.scope, 1.0));
        assert!(approx(r.effort, 0.0));
        assert!(approx(r.total, 0.9));
    }

    #[test]
    fn test_invalid_call_zeroes_parse_term() {
        let truth = [Finding::new("a.py", 3)];
        let spec = ToolCallSpec::new("structural_search", json!({"pattern": "def $F($$$)"}));
        let r = reward(&truth, &truth, &spec, 0.0);
        assert!(approx(r.parse, 0.0));
        // Only the find and scope terms remain.
        assert!(approx(r.total, 0.5 * 1.0 + 0.2 * 1.0));
    }

    #[test]
    fn test_effort_counts_false_positives() {
        let predicted = [
            Finding::new("a.py", 1),
            Finding::new("a.py", 50),
            Finding::new("a.py", 90),
        ];
        let truth = [Finding::new("a.py", 1)];
        let r = reward(&predicted, &truth, &text_spec("x", false), 0.0);
        assert!(approx(r.effort, 0.02));
        let expected = 0.2 + 0.5 * r.find + 0.2 * 1.0 - 0.05 * 0.02;
        assert!(approx(r.total, expected));
    }

    #[test]
    fn test_pcre2_rule() {
        let missing = reward(&[], &[], &text_spec(r"(\w+) \1", false), 0.0);
        assert!(approx(missing.pcre2_rule, 1.0));

        let flagged = reward(&[], &[], &text_spec(r"(\w+) \1", true), 0.0);
        assert!(approx(flagged.pcre2_rule, 0.0));

        let plain = reward(&[], &[], &text_spec("[a-z]+", false), 0.0);
        assert!(approx(plain.pcre2_rule, 0.0));

        // Structural patterns are never charged.
        let structural = ToolCallSpec::new(
            "structural_search",
            json!({"pattern": "(?=x)", "language": "python"}),
        );
        assert!(approx(reward(&[], &[], &structural, 0.0).pcre2_rule, 0.0));
    }

    #[test]
    fn test_pcre2_rule_applies_to_legacy_name() {
        let spec = ToolCallSpec::new("ripgrep_search", json!({"pattern": "(?<=a)b"}));
        assert!(approx(reward(&[], &[], &spec, 0.0).pcre2_rule, 1.0));
    }

    #[test]
    fn test_error_flag_penalty() {
        let truth = [Finding::new("a.py", 3)];
        let r = reward(&[], &truth, &text_spec("x", false), 1.0);
        assert!(approx(r.errors, 1.0));
        assert!(approx(r.total, 0.2 - 0.5));
    }

    #[test]
    fn test_fractional_error_flag_is_passed_through() {
        let truth = [Finding::new("a.py", 3)];
        let r = reward(&truth, &truth, &text_spec("x", false), 0.4);
        assert!(approx(r.errors, 0.4));
        assert!(approx(r.total, 0.9 - 0.5 * 0.4));

        let counted = reward(&truth, &truth, &text_spec("x", false), 3.0);
        assert!(approx(counted.errors, 3.0));
        assert!(approx(counted.total, 0.9 - 1.5));
    }

    #[test]
    fn test_custom_weights() {
        let weights = RewardWeights {
            alpha: 0.0,
            beta: 1.0,
            gamma: 0.0,
            delta: 0.0,
            zeta: 0.0,
            effort_per_false_positive: 0.0,
        };
        let truth = [Finding::new("a.py", 3)];
        let r = compute_reward(&truth, &truth, &text_spec("x", false), 0, &weights, 1.0);
        assert!(approx(r.total, 1.0));
    }

    struct RejectAll;

    impl ToolCallValidator for RejectAll {
        fn validate(&self, spec: &ToolCallSpec) -> Result<ToolCall, ToolCallValidationError> {
            Err(ToolCallValidationError::UnknownTool(spec.name.clone()))
        }
    }

    #[test]
    fn test_custom_validator() {
        let r = compute_reward_with(
            &RejectAll,
            &[],
            &[],
            &text_spec("x", false),
            0,
            &RewardWeights::default(),
            0.0,
        );
        assert!(approx(r.parse, 0.0));
    }

    #[test]
    fn test_reward_from_existing_grade_matches() {
        let predicted = [Finding::new("a.py", 1), Finding::new("b.py", 9)];
        let truth = [Finding::new("a.py", 2)];
        let spec = text_spec("x", false);
        let weights = RewardWeights::default();

        let graded = grade(&predicted, &truth, 1);
        let from_grade =
            compute_reward_from_grade(&SchemaValidator::new(), &graded, &spec, &weights, 1.0);
        let direct = compute_reward(&predicted, &truth, &spec, 1, &weights, 1.0);
        assert_eq!(from_grade, direct);
    }

    #[test]
    fn test_serialized_component_names() {
        let r = reward(&[], &[], &text_spec("x", false), 0.0);
        let json = serde_json::to_value(r).unwrap();
        let keys = [
            "R_parse",
            "R_find",
            "R_scope",
            "R_effort",
            "R_pcre2_rule",
            "R_errors",
            "total",
        ];
        for key in keys {
            assert!(json.get(key).is_some(), "{key}");
        }
    }
}
