//! Normalized match locations shared by every tool adapter and the grader.
//!
//! Adapters translate their tool-native output into [`Finding`] values at the
//! parse boundary; nothing downstream sees ast-grep or ripgrep shapes.

use serde::{Deserialize, Serialize};

use crate::error::FindingError;

/// One match location and its text.
///
/// Findings are plain values: equality and hashing cover every field, so they
/// can be collected into `HashSet`s or used as map keys.
///
/// Deserialization goes through the same clamping as the builders, and an
/// empty path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFinding")]
pub struct Finding {
    /// Path relative to the searched corpus root.
    pub path: String,
    /// First matched line (1-indexed).
    pub line: u32,
    /// First matched column (1-indexed), when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Last matched line; `None` means the match ends on `line`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Last matched column; `None` means it ends on `column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    /// Matched content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Lines printed before the match when context was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<Vec<String>>,
    /// Lines printed after the match when context was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<Vec<String>>,
}

impl Finding {
    /// Creates a single-line finding. Line numbers below 1 are clamped to 1.
    pub fn new(path: impl Into<String>, line: u32) -> Self {
        Self {
            path: path.into(),
            line: line.max(1),
            column: None,
            end_line: None,
            end_column: None,
            text: None,
            context_before: None,
            context_after: None,
        }
    }

    /// Sets the start column.
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column.max(1));
        self
    }

    /// Sets the end position. An end line before the start line is raised to it.
    pub fn with_end(mut self, end_line: u32, end_column: Option<u32>) -> Self {
        self.end_line = Some(end_line.max(self.line));
        self.end_column = end_column;
        self
    }

    /// Sets the end line only.
    pub fn with_end_line(mut self, end_line: u32) -> Self {
        self.end_line = Some(end_line.max(self.line));
        self
    }

    /// Sets the matched text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the surrounding context lines. Empty lists are stored as `None`.
    pub fn with_context(mut self, before: Vec<String>, after: Vec<String>) -> Self {
        self.context_before = (!before.is_empty()).then_some(before);
        self.context_after = (!after.is_empty()).then_some(after);
        self
    }

    /// Last line covered by this finding.
    pub fn effective_end_line(&self) -> u32 {
        self.end_line.unwrap_or(self.line)
    }

    /// Last column covered by this finding.
    pub fn effective_end_column(&self) -> Option<u32> {
        self.end_column.or(self.column)
    }

    /// Projects this finding onto its line span.
    pub fn span(&self) -> Span<'_> {
        Span::new(&self.path, self.line, self.effective_end_line())
    }
}

/// Wire shape of a [`Finding`] before its positions are checked.
#[derive(Deserialize)]
struct RawFinding {
    path: String,
    line: u32,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default)]
    end_column: Option<u32>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    context_before: Option<Vec<String>>,
    #[serde(default)]
    context_after: Option<Vec<String>>,
}

impl TryFrom<RawFinding> for Finding {
    type Error = FindingError;

    fn try_from(raw: RawFinding) -> Result<Self, Self::Error> {
        if raw.path.is_empty() {
            return Err(FindingError::EmptyPath);
        }
        let mut finding = Finding::new(raw.path, raw.line);
        finding.column = raw.column.map(|c| c.max(1));
        finding.end_line = raw.end_line.map(|l| l.max(finding.line));
        finding.end_column = raw.end_column;
        finding.text = raw.text;
        finding.context_before = raw.context_before;
        finding.context_after = raw.context_after;
        Ok(finding)
    }
}

/// The `(path, start_line, end_line)` projection of a [`Finding`].
///
/// Spans are derived on demand and borrow the path from their finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span<'a> {
    pub path: &'a str,
    pub start_line: u32,
    pub end_line: u32,
}

impl<'a> Span<'a> {
    /// Builds a span, swapping reversed bounds.
    pub fn new(path: &'a str, start_line: u32, end_line: u32) -> Self {
        let (start_line, end_line) = if end_line < start_line {
            (end_line, start_line)
        } else {
            (start_line, end_line)
        };
        Self {
            path,
            start_line,
            end_line,
        }
    }

    /// Whether both spans are in the same file and their line ranges overlap
    /// once each range is widened by `tolerance` lines on both ends.
    pub fn overlaps(&self, other: &Span<'_>, tolerance: u32) -> bool {
        if self.path != other.path {
            return false;
        }
        let t = i64::from(tolerance);
        let (a0, a1) = (i64::from(self.start_line) - t, i64::from(self.end_line) + t);
        let (b0, b1) = (i64::from(other.start_line) - t, i64::from(other.end_line) + t);
        a0 <= b1 && b0 <= a1
    }
}
