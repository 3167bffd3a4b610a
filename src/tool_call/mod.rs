//! Tool-call model consumed by the adapters and the reward synthesizer.
//!
//! A [`ToolCallSpec`] is the raw `{name, arguments}` object a model emits. It
//! stays opaque until a [`ToolCallValidator`] turns it into a typed
//! [`ToolCall`]; the reward only peeks at `pattern` and `pcre2` directly.

pub mod schema;
pub mod validator;

pub use validator::{SchemaValidator, ToolCallValidator};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The two supported external search tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// AST pattern search (ast-grep).
    #[serde(alias = "ast_grep_search")]
    StructuralSearch,
    /// Regex text search (ripgrep).
    #[serde(alias = "ripgrep_search")]
    TextSearch,
}

impl ToolName {
    /// Canonical identifier used in tool calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::StructuralSearch => "structural_search",
            ToolName::TextSearch => "text_search",
        }
    }

    /// Name of the binary this tool is launched with by default.
    pub fn default_program(&self) -> &'static str {
        match self {
            ToolName::StructuralSearch => "ast-grep",
            ToolName::TextSearch => "rg",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural_search" | "ast_grep_search" => Ok(ToolName::StructuralSearch),
            "text_search" | "ripgrep_search" => Ok(ToolName::TextSearch),
            other => Err(format!("Unknown tool name: {}", other)),
        }
    }
}

/// Languages accepted by the structural search tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Rust,
    Go,
    Java,
    Cpp,
    Csharp,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Rust,
        Language::Go,
        Language::Java,
        Language::Cpp,
        Language::Csharp,
    ];

    /// Identifier passed to `ast-grep -l`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Csharp => "csharp",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw tool call as emitted by a model: a name plus an argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSpec {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallSpec {
    /// Creates a spec from a tool name and an arguments value.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// The tool this spec names, if the name is recognised.
    pub fn tool(&self) -> Option<ToolName> {
        self.name.parse().ok()
    }

    fn argument_map(&self) -> Option<&Map<String, Value>> {
        self.arguments.as_object()
    }

    /// The `pattern` argument, when present as a string.
    pub fn pattern(&self) -> Option<&str> {
        self.argument_map()?.get("pattern")?.as_str()
    }

    /// The extended-engine flag; absent or non-boolean reads as `false`.
    pub fn pcre2(&self) -> bool {
        self.argument_map()
            .and_then(|args| args.get("pcre2"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl From<&ToolCall> for ToolCallSpec {
    fn from(call: &ToolCall) -> Self {
        let (name, arguments) = match call {
            ToolCall::StructuralSearch(args) => {
                (ToolName::StructuralSearch, serde_json::to_value(args))
            }
            ToolCall::TextSearch(args) => (ToolName::TextSearch, serde_json::to_value(args)),
        };
        Self {
            name: name.as_str().to_string(),
            // Argument structs only hold strings, bools and integers.
            arguments: arguments.unwrap_or(Value::Null),
        }
    }
}

/// Arguments of a structural (ast-grep) search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuralSearchArgs {
    pub pattern: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
}

impl StructuralSearchArgs {
    pub fn new(pattern: impl Into<String>, language: Language) -> Self {
        Self {
            pattern: pattern.into(),
            language,
            paths: None,
        }
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = Some(paths);
        self
    }
}

/// Arguments of a text (ripgrep) search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSearchArgs {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub pcre2: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_lines: Option<u32>,
}

impl TextSearchArgs {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = Some(file_types);
        self
    }

    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_pcre2(mut self, pcre2: bool) -> Self {
        self.pcre2 = pcre2;
        self
    }

    pub fn with_context_lines(mut self, lines: u32) -> Self {
        self.context_lines = Some(lines);
        self
    }
}

/// A validated tool call with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    StructuralSearch(StructuralSearchArgs),
    TextSearch(TextSearchArgs),
}

impl ToolCall {
    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::StructuralSearch(_) => ToolName::StructuralSearch,
            ToolCall::TextSearch(_) => ToolName::TextSearch,
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            ToolCall::StructuralSearch(args) => &args.pattern,
            ToolCall::TextSearch(args) => &args.pattern,
        }
    }
}
