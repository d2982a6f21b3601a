//! Single-source and single-file analysis.
//!
//! The engine owns the strategy registry and the detector set and is handed
//! a shared cache. `analyze_source` is pure; `analyze_file` fingerprints the
//! file and goes through the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{count_code_lines, AnalysisResult, AnalyzerRegistry, ParsedSource, TEXT_LANGUAGE};
use crate::cache::AnalysisCache;
use crate::detect::{sort_by_line, Category, DetectionInput, DetectorSet, Issue, Severity, Thresholds};
use crate::fingerprint::Fingerprint;
use crate::project::FileError;

/// Result of analyzing one file through the cache.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub result: Arc<AnalysisResult>,
    /// True when the result was not computed by this request.
    pub cache_hit: bool,
}

/// Analysis front end: language detection, dispatch, detectors, caching.
pub struct AnalysisEngine {
    registry: AnalyzerRegistry,
    detectors: DetectorSet,
    cache: Arc<AnalysisCache>,
}

impl AnalysisEngine {
    pub fn new(registry: AnalyzerRegistry, detectors: DetectorSet, cache: Arc<AnalysisCache>) -> Self {
        Self {
            registry,
            detectors,
            cache,
        }
    }

    /// Engine with every built-in language and the standard detectors.
    pub fn with_defaults(thresholds: &Thresholds, cache: Arc<AnalysisCache>) -> anyhow::Result<Self> {
        Ok(Self::new(
            AnalyzerRegistry::with_defaults()?,
            DetectorSet::new(thresholds)?,
            cache,
        ))
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    /// Language tag for a file.
    pub fn detect_language(&self, path: &Path, content: &str) -> &'static str {
        self.registry.detect_language(path, content)
    }

    /// Analyze source text as the given language. Never fails: a parse
    /// failure degrades to the language's heuristic strategy.
    pub fn analyze_source(&self, content: &str, language: &str) -> AnalysisResult {
        let tag = if self.registry.is_registered(language) {
            language
        } else {
            TEXT_LANGUAGE
        };

        let primary = self.registry.get(tag);
        let (strategy, parsed, degraded) = match primary.parse(content) {
            Ok(parsed) => (primary, parsed, None),
            Err(err) => {
                let fallback = self.registry.fallback_for(tag);
                info!(language = tag, error = %err, "structural parse failed, using heuristics");
                let parsed = fallback
                    .parse(content)
                    .unwrap_or_else(|_| ParsedSource::plain(content));
                (fallback, parsed, Some(err))
            }
        };

        let lines_of_code = count_code_lines(content, strategy.comment_prefixes());
        let functions = strategy.extract_functions(&parsed);
        let classes = strategy.extract_classes(&parsed);
        let imports = strategy.extract_imports(&parsed);
        let complexity_score = strategy.score_complexity(&parsed, lines_of_code);

        let input = DetectionInput {
            language: tag,
            text: content,
            lines: content.lines().collect(),
            lines_of_code,
            functions: &functions,
            classes: &classes,
            comment_prefixes: strategy.comment_prefixes(),
            language_rules: strategy.suspicious_patterns(),
        };

        let mut issues = Vec::new();
        if let Some(err) = &degraded {
            issues.push(Issue::new(
                Severity::Info,
                Category::Smell,
                format!("structural parse failed ({}); degraded to heuristic analysis", err),
            ));
        }
        issues.extend(self.detectors.run(&input));
        sort_by_line(&mut issues);

        AnalysisResult {
            language: tag.to_string(),
            lines_of_code,
            complexity_score,
            functions,
            classes,
            imports,
            issues,
            degraded: degraded.is_some(),
        }
    }

    /// Fingerprint a file and analyze it through the cache.
    pub fn analyze_file(&self, path: &Path) -> Result<FileAnalysis, FileError> {
        let (fingerprint, bytes) =
            Fingerprint::read(path).map_err(|e| FileError::from_io(path, &e))?;
        let text = String::from_utf8(bytes).map_err(|e| FileError::encoding(path, &e))?;
        let language = self.detect_language(path, &text);

        let lookup = self
            .cache
            .get_or_compute(&fingerprint, language, || self.analyze_source(&text, language));
        debug!(path = %path.display(), language, hit = lookup.hit, "analyzed file");

        Ok(FileAnalysis {
            path: path.to_path_buf(),
            fingerprint,
            result: lookup.result,
            cache_hit: lookup.hit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::with_defaults(&Thresholds::default(), Arc::new(AnalysisCache::new(64)))
            .unwrap()
    }

    #[test]
    fn test_analyze_source_is_deterministic() {
        let engine = engine();
        let source = "import os\n\ndef main():\n    if os.name:\n        return 1\n    return 0\n";
        let a = engine.analyze_source(source, "python");
        let b = engine.analyze_source(source, "python");

        assert_eq!(a, b);
        assert_eq!(a.language, "python");
        assert_eq!(a.lines_of_code, 5);
        assert_eq!(a.imports, vec!["os"]);
        // (1 + 1 decision) * 100 / 100
        assert_eq!(a.complexity_score, 2.0);
        assert!(!a.degraded);
    }

    #[test]
    fn test_parse_failure_degrades() {
        let engine = engine();
        let source = "def ok():\n    \"\"\"Fine.\"\"\"\n    return 1\n\ndef broken(:\n    pass\n";
        let result = engine.analyze_source(source, "python");

        assert!(result.degraded);
        assert_eq!(result.language, "python");
        let first = &result.issues[0];
        assert_eq!(first.severity, Severity::Info);
        assert_eq!(first.category, Category::Smell);
        assert!(first.message.contains("degraded to heuristic analysis"));
        assert!(first.line.is_none());
        assert!(result.find_function("ok").is_some());
    }

    #[test]
    fn test_unknown_language_is_text() {
        let engine = engine();
        let result = engine.analyze_source("hello\n\nworld\n", "klingon");
        assert_eq!(result.language, "text");
        assert_eq!(result.lines_of_code, 2);
        assert!(result.functions.is_empty());
    }

    #[test]
    fn test_issues_sorted_by_line() {
        let engine = engine();
        let marker = "FIXME";
        let source = format!(
            "def a():\n    pass\n\n# {}: later\ndef b():\n    eval('1')\n",
            marker
        );
        let result = engine.analyze_source(&source, "python");
        let lines: Vec<_> = result.issues.iter().map(|i| i.line.unwrap_or(0)).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(result
            .issues
            .iter()
            .any(|i| i.category == Category::Security && i.line == Some(6)));
    }
}
