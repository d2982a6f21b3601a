//! Language strategies and the registry that dispatches to them.
//!
//! # Adding a New Language
//!
//! 1. Create a module here with a `register(&mut AnalyzerRegistry)` function
//! 2. Build a [`TreeSitterAnalyzer`] or [`HeuristicAnalyzer`] from a spec
//! 3. Call it from [`AnalyzerRegistry::with_defaults`]
//!
//! See `python.rs` for a structural strategy with a heuristic twin.

mod c_family;
mod go;
mod heuristic;
mod javascript;
mod python;
mod rust_lang;
mod scripting;
mod treesitter;

pub use heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
pub use treesitter::{StructuralSpec, TreeSitterAnalyzer};

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use super::{LanguageAnalyzer, TEXT_LANGUAGE};

/// Maps language tags to strategies.
///
/// Each tag has a primary strategy and optionally a fallback used when the
/// primary cannot parse a file. Unknown tags use the generic strategy.
pub struct AnalyzerRegistry {
    primary: HashMap<&'static str, Box<dyn LanguageAnalyzer>>,
    fallback: HashMap<&'static str, Box<dyn LanguageAnalyzer>>,
    generic: Box<dyn LanguageAnalyzer>,
    extensions: HashMap<String, &'static str>,
}

impl AnalyzerRegistry {
    /// An empty registry with only the generic strategy.
    pub fn new(generic: Box<dyn LanguageAnalyzer>) -> Self {
        Self {
            primary: HashMap::new(),
            fallback: HashMap::new(),
            generic,
            extensions: HashMap::new(),
        }
    }

    /// Registry with every built-in language.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let mut registry = Self::new(Box::new(heuristic::generic()?));
        python::register(&mut registry)?;
        rust_lang::register(&mut registry)?;
        go::register(&mut registry)?;
        javascript::register(&mut registry)?;
        c_family::register(&mut registry)?;
        scripting::register(&mut registry)?;
        Ok(registry)
    }

    /// Register a primary strategy and claim its extensions.
    pub fn register(&mut self, strategy: Box<dyn LanguageAnalyzer>) {
        let id = strategy.language_id();
        for ext in strategy.file_extensions() {
            self.extensions.insert(ext.to_ascii_lowercase(), id);
        }
        self.primary.insert(id, strategy);
    }

    /// Register a fallback for the strategy's language tag.
    pub fn register_fallback(&mut self, strategy: Box<dyn LanguageAnalyzer>) {
        self.fallback.insert(strategy.language_id(), strategy);
    }

    /// Strategy for a tag, or the generic strategy for unknown tags.
    pub fn get(&self, language: &str) -> &dyn LanguageAnalyzer {
        self.primary
            .get(language)
            .map(|s| s.as_ref())
            .unwrap_or(self.generic.as_ref())
    }

    /// Strategy to use after the primary failed to parse.
    pub fn fallback_for(&self, language: &str) -> &dyn LanguageAnalyzer {
        self.fallback
            .get(language)
            .map(|s| s.as_ref())
            .unwrap_or(self.generic.as_ref())
    }

    pub fn is_registered(&self, language: &str) -> bool {
        self.primary.contains_key(language)
    }

    /// Detect the language of a file from its extension and content.
    pub fn detect_language(&self, path: &Path, content: &str) -> &'static str {
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.extensions.get(&e.to_ascii_lowercase()).copied());

        by_extension
            .or_else(|| sniff(content))
            .unwrap_or(TEXT_LANGUAGE)
    }

    /// All registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let set: BTreeSet<_> = self.extensions.keys().cloned().collect();
        set.into_iter().collect()
    }

    /// All registered language tags, sorted.
    pub fn languages(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.primary.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

/// Recognize interpreter lines and PHP open tags.
fn sniff(content: &str) -> Option<&'static str> {
    let first = content.lines().next()?.trim();

    if let Some(shebang) = first.strip_prefix("#!") {
        let interpreter = shebang
            .split_whitespace()
            .flat_map(|part| part.rsplit('/').next())
            .find(|name| *name != "env")?;
        return match interpreter {
            i if i.starts_with("python") => Some("python"),
            "bash" | "sh" | "zsh" | "dash" | "ksh" => Some("bash"),
            i if i.starts_with("ruby") => Some("ruby"),
            "node" | "nodejs" | "deno" => Some("javascript"),
            _ => None,
        };
    }

    if first.starts_with("<?php") {
        return Some("php");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        let registry = AnalyzerRegistry::with_defaults().unwrap();
        assert_eq!(registry.detect_language(Path::new("a/b.py"), ""), "python");
        assert_eq!(registry.detect_language(Path::new("main.RS"), ""), "rust");
        assert_eq!(registry.detect_language(Path::new("App.tsx"), ""), "tsx");
        assert_eq!(registry.detect_language(Path::new("x.hpp"), ""), "cpp");
        assert_eq!(registry.detect_language(Path::new("notes.txt"), "hi"), "text");
    }

    #[test]
    fn test_detect_by_content() {
        let registry = AnalyzerRegistry::with_defaults().unwrap();
        assert_eq!(
            registry.detect_language(Path::new("tool"), "#!/usr/bin/env python3\nprint(1)\n"),
            "python"
        );
        assert_eq!(
            registry.detect_language(Path::new("run"), "#!/bin/bash\necho hi\n"),
            "bash"
        );
        assert_eq!(
            registry.detect_language(Path::new("serve"), "#!/usr/bin/env node\n"),
            "javascript"
        );
        assert_eq!(
            registry.detect_language(Path::new("index"), "<?php echo 1;"),
            "php"
        );
        assert_eq!(
            registry.detect_language(Path::new("run"), "#!/usr/bin/perl\n"),
            "text"
        );
    }

    #[test]
    fn test_unknown_tag_uses_generic() {
        let registry = AnalyzerRegistry::with_defaults().unwrap();
        assert_eq!(registry.get("cobol").language_id(), "text");
        assert_eq!(registry.fallback_for("java").language_id(), "text");
        assert_eq!(registry.fallback_for("python").language_id(), "python");
    }

    #[test]
    fn test_registered_languages() {
        let registry = AnalyzerRegistry::with_defaults().unwrap();
        assert_eq!(
            registry.languages(),
            vec![
                "bash",
                "c",
                "cpp",
                "go",
                "java",
                "javascript",
                "php",
                "python",
                "ruby",
                "rust",
                "sql",
                "tsx",
                "typescript"
            ]
        );
        assert!(registry.extensions().contains(&"mjs".to_string()));
    }
}
