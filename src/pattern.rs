//! Static detection of regex features that need an extended (PCRE2) engine.
//!
//! ripgrep's default engine rejects lookaround and backreferences; those
//! patterns only run with `-P`. The detector is a single left-to-right scan
//! that tracks escapes and character classes, so `\\1` (a literal backslash
//! followed by `1`) and `[(?=]` are not reported.

use serde::{Deserialize, Serialize};

/// A regex construct that requires an extended engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFeature {
    Lookahead,
    NegativeLookahead,
    Lookbehind,
    NegativeLookbehind,
    Backreference,
    NamedBackreference,
}

impl PatternFeature {
    fn describe(&self) -> &'static str {
        match self {
            PatternFeature::Lookahead => "pattern contains lookahead",
            PatternFeature::NegativeLookahead => "pattern contains negative lookahead",
            PatternFeature::Lookbehind => "pattern contains lookbehind",
            PatternFeature::NegativeLookbehind => "pattern contains negative lookbehind",
            PatternFeature::Backreference => "pattern contains backreference",
            PatternFeature::NamedBackreference => "pattern contains named backreference",
        }
    }
}

/// Outcome of [`requires_extended_engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternVerdict {
    pub requires_extended: bool,
    pub reason: String,
    /// The first extended construct found, if any.
    pub feature: Option<PatternFeature>,
}

impl PatternVerdict {
    fn plain() -> Self {
        Self {
            requires_extended: false,
            reason: "PCRE2 not required".to_string(),
            feature: None,
        }
    }

    fn extended(feature: PatternFeature) -> Self {
        Self {
            requires_extended: true,
            reason: feature.describe().to_string(),
            feature: Some(feature),
        }
    }
}

/// Classifies whether `pattern` needs an extended regex engine.
///
/// Flags lookahead, lookbehind (both polarities), numeric backreferences
/// (`\1`, `\g1`, `\g{1}`, `\g-1`) and named backreferences (`\k<n>`,
/// `\k'n'`, `\k{n}`, `(?P=n)`). Non-capturing groups, named capture groups
/// and character classes are not flagged.
pub fn requires_extended_engine(pattern: &str) -> PatternVerdict {
    match find_extended_feature(pattern) {
        Some(feature) => PatternVerdict::extended(feature),
        None => PatternVerdict::plain(),
    }
}

fn find_extended_feature(pattern: &str) -> Option<PatternFeature> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut in_class = false;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let next = chars.get(i + 1).copied();
                if !in_class {
                    if let Some(feature) = escape_feature(&chars[i + 1..]) {
                        return Some(feature);
                    }
                }
                // Skip the escaped character whatever it is.
                i += if next.is_some() { 2 } else { 1 };
                continue;
            }
            '[' if !in_class => {
                in_class = true;
                i += 1;
                // A leading `^` and a leading `]` belong to the class body.
                if chars.get(i) == Some(&'^') {
                    i += 1;
                }
                if chars.get(i) == Some(&']') {
                    i += 1;
                }
                continue;
            }
            ']' if in_class => in_class = false,
            '(' if !in_class => {
                if let Some(feature) = group_feature(&chars[i + 1..]) {
                    return Some(feature);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Inspects the characters following a backslash.
fn escape_feature(rest: &[char]) -> Option<PatternFeature> {
    match rest {
        [d, ..] if ('1'..='9').contains(d) => Some(PatternFeature::Backreference),
        ['k', '<' | '\'' | '{', ..] => Some(PatternFeature::NamedBackreference),
        ['g', '{', c, ..] if c.is_ascii_digit() || *c == '-' => {
            Some(PatternFeature::Backreference)
        }
        ['g', '{', ..] => Some(PatternFeature::NamedBackreference),
        ['g', c, ..] if c.is_ascii_digit() || *c == '-' => Some(PatternFeature::Backreference),
        _ => None,
    }
}

/// Inspects the characters following an unescaped `(`.
fn group_feature(rest: &[char]) -> Option<PatternFeature> {
    match rest {
        ['?', '=', ..] => Some(PatternFeature::Lookahead),
        ['?', '!', ..] => Some(PatternFeature::NegativeLookahead),
        ['?', '<', '=', ..] => Some(PatternFeature::Lookbehind),
        ['?', '<', '!', ..] => Some(PatternFeature::NegativeLookbehind),
        ['?', 'P', '=', ..] => Some(PatternFeature::NamedBackreference),
        _ => None,
    }
}
