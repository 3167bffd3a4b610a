//! Tool-call validation.
//!
//! The reward only needs a yes/no answer from a validator, so validation sits
//! behind [`ToolCallValidator`]. [`SchemaValidator`] is the default: it checks
//! a spec against the typed argument structs, which mirror the JSON schemas
//! in [`super::schema`].

use serde_json::Value;

use super::{ToolCall, ToolCallSpec, ToolName};
use crate::error::ToolCallValidationError;

/// Decides whether a raw tool call is well formed.
pub trait ToolCallValidator: Send + Sync {
    /// Validates `spec` and returns its typed form.
    fn validate(&self, spec: &ToolCallSpec) -> Result<ToolCall, ToolCallValidationError>;

    /// Convenience wrapper returning only the verdict.
    fn is_valid(&self, spec: &ToolCallSpec) -> bool {
        self.validate(spec).is_ok()
    }
}

/// Validator backed by the tools' argument schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

impl ToolCallValidator for SchemaValidator {
    fn validate(&self, spec: &ToolCallSpec) -> Result<ToolCall, ToolCallValidationError> {
        let tool: ToolName = spec
            .name
            .parse()
            .map_err(|_| ToolCallValidationError::UnknownTool(spec.name.clone()))?;

        if !spec.arguments.is_object() {
            return Err(ToolCallValidationError::ArgumentsNotObject);
        }

        let call = match tool {
            ToolName::StructuralSearch => {
                ToolCall::StructuralSearch(parse_args(tool, &spec.arguments)?)
            }
            ToolName::TextSearch => ToolCall::TextSearch(parse_args(tool, &spec.arguments)?),
        };

        if call.pattern().is_empty() {
            return Err(ToolCallValidationError::EmptyPattern);
        }

        Ok(call)
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    tool: ToolName,
    arguments: &Value,
) -> Result<T, ToolCallValidationError> {
    T::deserialize(arguments).map_err(|e| ToolCallValidationError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}
