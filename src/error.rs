//! Error types for codesearch-gym operations.
//!
//! Defines error types for each subsystem:
//! - External tool execution (adapters)
//! - Tool-call validation
//! - Finding decoding
//! - Configuration loading
//! - Verification case loading
//!
//! Adapter errors never reach callers directly: adapters fold them into
//! [`AdapterOutput`](crate::adapters::AdapterOutput) via [`FailureKind`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while running an external search tool.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{program} not found: {message}")]
    ExecutableNotFound { program: String, message: String },

    #[error("timeout: {program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("Failed to parse {tool} output: {message}")]
    OutputParse { tool: String, message: String },

    #[error("{program} exited with unexpected code {code}")]
    UnexpectedExitCode { program: String, code: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// The failure category reported to callers.
    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::ExecutableNotFound { .. } => FailureKind::ExecutableNotFound,
            AdapterError::Timeout { .. } => FailureKind::Timeout,
            AdapterError::OutputParse { .. } => FailureKind::OutputParseError,
            AdapterError::UnexpectedExitCode { .. } => FailureKind::UnexpectedExitCode,
            AdapterError::Io(_) => FailureKind::Io,
        }
    }
}

/// Category of an adapter failure, so callers can tell environment problems
/// apart from pattern or runtime errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tool binary could not be launched.
    ExecutableNotFound,
    /// The call exceeded its deadline and the process was killed.
    Timeout,
    /// The tool's output could not be parsed as a whole.
    OutputParseError,
    /// The tool exited with a code other than "matches" or "no matches".
    UnexpectedExitCode,
    /// The tool call failed validation and was never executed.
    InvalidToolCall,
    /// Any other I/O failure while talking to the process.
    Io,
}

impl FailureKind {
    /// Stable snake_case tag for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ExecutableNotFound => "executable_not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::OutputParseError => "output_parse_error",
            FailureKind::UnexpectedExitCode => "unexpected_exit_code",
            FailureKind::InvalidToolCall => "invalid_tool_call",
            FailureKind::Io => "io",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a tool call is rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallValidationError {
    #[error("Unknown tool name: {0}")]
    UnknownTool(String),

    #[error("arguments must be a JSON object")]
    ArgumentsNotObject,

    #[error("pattern must be a non-empty string")]
    EmptyPattern,

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Reasons a serialized finding is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindingError {
    #[error("finding path must not be empty")]
    EmptyPath,
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors that can occur while loading verification cases.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Failed to read cases from '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Case '{id}' has no ground truth findings")]
    EmptyGroundTruth { id: String },

    #[error("Case '{id}' has an invalid tool call: {source}")]
    InvalidToolCall {
        id: String,
        #[source]
        source: ToolCallValidationError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_carries_tag() {
        let err = AdapterError::Timeout {
            program: "rg".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.to_string().starts_with("timeout"));
        assert_eq!(err.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_not_found_message() {
        let err = AdapterError::ExecutableNotFound {
            program: "ast-grep".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("not found"));
        assert_eq!(err.kind(), FailureKind::ExecutableNotFound);
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::ExecutableNotFound).unwrap();
        assert_eq!(json, "\"executable_not_found\"");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
    }
}
