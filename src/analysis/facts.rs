//! Fact structures produced by analysis.

use serde::{Deserialize, Serialize};

use crate::detect::Issue;

/// Tag used when no strategy recognizes a file.
pub const TEXT_LANGUAGE: &str = "text";

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Start line (1-indexed).
    pub line: usize,
    /// Last line of the body (1-indexed, inclusive).
    pub end_line: usize,
    /// Cyclomatic-style complexity: 1 + decision points inside the body.
    pub complexity: u32,
    /// Deepest nesting of control-flow blocks inside the body.
    pub nesting: u32,
}

impl FunctionInfo {
    /// Number of lines spanned by the declaration.
    pub fn span_lines(&self) -> usize {
        self.end_line.saturating_sub(self.line) + 1
    }
}

/// A class, struct, trait, interface or other named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
}

/// Everything extracted from a single source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub language: String,
    pub lines_of_code: usize,
    pub complexity_score: f64,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<String>,
    pub issues: Vec<Issue>,
    /// Set when structural parsing failed and heuristics were used instead.
    #[serde(default)]
    pub degraded: bool,
}

impl AnalysisResult {
    /// Create an empty result for a language.
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            lines_of_code: 0,
            complexity_score: 0.0,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            issues: Vec::new(),
            degraded: false,
        }
    }

    /// Find a function by name.
    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Issues attached to a given line.
    pub fn issues_at(&self, line: usize) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.line == Some(line))
    }
}

/// File-level complexity score.
///
/// `score = (1 + decisions) * 100 / max(lines_of_code, 100)`, rounded to two
/// decimals. Files shorter than 100 lines are scored as if they had 100, so
/// the score reads as "decision points per 100 lines" and never divides by a
/// tiny denominator.
pub fn complexity_score(decisions: usize, lines_of_code: usize) -> f64 {
    let raw = (1 + decisions) as f64 * 100.0 / lines_of_code.max(100) as f64;
    (raw * 100.0).round() / 100.0
}

/// Count non-blank lines that are not solely a line comment.
pub fn count_code_lines(source: &str, comment_prefixes: &[&str]) -> usize {
    source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !comment_prefixes.iter().any(|p| l.starts_with(p)))
        .count()
}
