//! codesearch-gym: execution and grading engine for code-search tool calls.
//!
//! This library runs structural (ast-grep) and text (ripgrep) searches on
//! behalf of a model, normalizes their output into [`Finding`]s, grades the
//! findings against ground truth and turns the grade into a scalar reward.

// Core modules
pub mod adapters;
pub mod config;
pub mod error;
pub mod finding;
pub mod grader;
pub mod pattern;
pub mod reward;
pub mod tool_call;
pub mod verify;

// Re-export commonly used types
pub use adapters::{
    AdapterOutput, ExecutionContext, Executable, SearchAdapter, StructuralSearchAdapter,
    TextSearchAdapter, ToolRunner,
};
pub use config::GymConfig;
pub use error::{
    AdapterError, ConfigError, FailureKind, FindingError, ToolCallValidationError, VerifyError,
};
pub use finding::{Finding, Span};
pub use grader::{compute_file_overlap, compute_span_match, grade, GradeResult, SpanMetrics};
pub use pattern::{requires_extended_engine, PatternFeature, PatternVerdict};
pub use reward::{
    compute_reward, compute_reward_from_grade, compute_reward_with, RewardResult, RewardWeights,
};
pub use tool_call::{
    Language, SchemaValidator, StructuralSearchArgs, TextSearchArgs, ToolCall, ToolCallSpec,
    ToolCallValidator, ToolName,
};
pub use verify::{load_cases, CaseReport, VerificationCase, VerificationReport, Verifier};
