//! JSON schemas for the two search tools, in the shape used for LLM
//! function calling and structured-output decoding.

use serde_json::{json, Value};

use super::{Language, ToolName};

impl ToolName {
    /// Returns a description of what the tool does.
    pub fn description(&self) -> &'static str {
        match self {
            ToolName::StructuralSearch => {
                "Search source code by syntax tree pattern using ast-grep. Metavariables like $NAME and $$ARGS match arbitrary nodes."
            }
            ToolName::TextSearch => {
                "Search file contents with a regular expression using ripgrep. Set pcre2 for lookaround or backreferences."
            }
        }
    }

    /// Returns the JSON schema for this tool's arguments.
    pub fn parameters_schema(&self) -> Value {
        match self {
            ToolName::StructuralSearch => {
                let languages: Vec<&str> = Language::ALL.iter().map(Language::as_str).collect();
                json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "minLength": 1,
                            "description": "ast-grep pattern to match"
                        },
                        "language": {
                            "type": "string",
                            "enum": languages,
                            "description": "Language of the searched files"
                        },
                        "paths": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Files or directories to search (defaults to the corpus root)"
                        }
                    },
                    "required": ["pattern", "language"],
                    "additionalProperties": false
                })
            }
            ToolName::TextSearch => json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Regular expression to search for"
                    },
                    "file_types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "ripgrep file types to restrict the search to (e.g. 'py', 'js')"
                    },
                    "paths": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Files or directories to search (defaults to the corpus root)"
                    },
                    "case_sensitive": {
                        "type": "boolean",
                        "description": "Match case exactly (default: smart case)",
                        "default": false
                    },
                    "pcre2": {
                        "type": "boolean",
                        "description": "Use the PCRE2 engine (needed for lookaround and backreferences)",
                        "default": false
                    },
                    "context_lines": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Lines of context to print around each match"
                    }
                },
                "required": ["pattern"],
                "additionalProperties": false
            }),
        }
    }
}

/// Schema of a complete `{name, arguments}` tool call.
pub fn tool_call_schema() -> Value {
    let tools = [ToolName::StructuralSearch, ToolName::TextSearch];
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "enum": tools.iter().map(ToolName::as_str).collect::<Vec<_>>()
            },
            "arguments": {
                "oneOf": tools.iter().map(ToolName::parameters_schema).collect::<Vec<_>>()
            }
        },
        "required": ["name", "arguments"],
        "additionalProperties": false
    })
}

/// Function-calling definitions for both tools.
pub fn function_definitions() -> Value {
    let tools: Vec<Value> = [ToolName::StructuralSearch, ToolName::TextSearch]
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.as_str(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                }
            })
        })
        .collect();

    Value::Array(tools)
}
