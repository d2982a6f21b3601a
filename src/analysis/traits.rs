//! Core traits for language analysis.

use super::{complexity_score, ClassInfo, FunctionInfo};
use crate::detect::CompiledRule;

/// Source text plus whatever structure a strategy could build for it.
///
/// Structural strategies attach a tree-sitter tree; heuristic strategies
/// work from the text alone and leave `tree` empty.
pub struct ParsedSource<'a> {
    /// The original source text.
    pub text: &'a str,
    /// The tree-sitter parse tree, when the strategy is structural.
    pub tree: Option<tree_sitter::Tree>,
}

impl<'a> ParsedSource<'a> {
    /// Wrap text without a tree.
    pub fn plain(text: &'a str) -> Self {
        Self { text, tree: None }
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &'a str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }
}

/// Language-specific analysis strategy.
///
/// Every supported language registers one of these with the
/// [`AnalyzerRegistry`](super::AnalyzerRegistry). Dispatch only ever goes
/// through this trait, so a new language needs no change to the engine.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language tag (e.g., "python", "rust").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this strategy handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Prefixes that mark a whole line as a comment.
    fn comment_prefixes(&self) -> &'static [&'static str] {
        &["//"]
    }

    /// Prepare source text for extraction.
    ///
    /// Structural strategies return an error when the text cannot be parsed
    /// cleanly; the engine then downgrades to a heuristic strategy.
    fn parse<'a>(&self, text: &'a str) -> anyhow::Result<ParsedSource<'a>> {
        Ok(ParsedSource::plain(text))
    }

    /// Declared functions and methods, in source order.
    fn extract_functions(&self, parsed: &ParsedSource) -> Vec<FunctionInfo>;

    /// Declared classes and other named types, in source order.
    fn extract_classes(&self, parsed: &ParsedSource) -> Vec<ClassInfo>;

    /// Import/include references, in source order without duplicates.
    fn extract_imports(&self, parsed: &ParsedSource) -> Vec<String>;

    /// Number of branch, loop, exception and boolean-operator points.
    fn count_decisions(&self, parsed: &ParsedSource) -> usize;

    /// File-level complexity score. See [`complexity_score`].
    fn score_complexity(&self, parsed: &ParsedSource, lines_of_code: usize) -> f64 {
        complexity_score(self.count_decisions(parsed), lines_of_code)
    }

    /// Language-specific suspicious pattern rules.
    fn suspicious_patterns(&self) -> &[CompiledRule] {
        &[]
    }

    /// Check if this strategy handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
