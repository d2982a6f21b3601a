//! Detection of oversized files and functions.
//!
//! - Long files: too many lines of code
//! - Crowded files: too many functions or classes
//! - Long functions: too many lines between declaration and end of body

use serde::{Deserialize, Serialize};

use super::{Category, DetectionInput, Detector, Issue, Severity};

/// Limits used by the size, function and nesting detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Maximum lines of code per file.
    pub max_file_lines: usize,
    /// Maximum lines per function.
    pub max_function_lines: usize,
    /// Maximum complexity per function.
    pub max_function_complexity: u32,
    /// Maximum control-flow nesting inside a function.
    pub max_nesting_depth: u32,
    /// Maximum functions per file.
    pub max_functions_per_file: usize,
    /// Maximum classes per file.
    pub max_classes_per_file: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_file_lines: 500,
            max_function_lines: 50,
            max_function_complexity: 10,
            max_nesting_depth: 3,
            max_functions_per_file: 25,
            max_classes_per_file: 10,
        }
    }
}

impl Thresholds {
    /// Return strict thresholds for small, fast-moving modules.
    pub fn strict() -> Self {
        Self {
            max_file_lines: 300,
            max_function_lines: 30,
            max_function_complexity: 7,
            max_nesting_depth: 2,
            max_functions_per_file: 15,
            max_classes_per_file: 5,
        }
    }

    /// Return relaxed thresholds for large, mature codebases.
    pub fn relaxed() -> Self {
        Self {
            max_file_lines: 2000,
            max_function_lines: 200,
            max_function_complexity: 30,
            max_nesting_depth: 6,
            max_functions_per_file: 50,
            max_classes_per_file: 30,
        }
    }
}

/// File-level size checks.
pub struct SizeDetector {
    thresholds: Thresholds,
}

impl SizeDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Detector for SizeDetector {
    fn name(&self) -> &'static str {
        "size"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        if input.lines_of_code > t.max_file_lines {
            issues.push(Issue::new(
                Severity::Warning,
                Category::Smell,
                format!(
                    "file has {} lines of code, exceeds maximum of {}",
                    input.lines_of_code, t.max_file_lines
                ),
            ));
        }

        if input.functions.len() > t.max_functions_per_file {
            issues.push(Issue::new(
                Severity::Warning,
                Category::Smell,
                format!(
                    "file has {} functions, exceeds maximum of {}",
                    input.functions.len(),
                    t.max_functions_per_file
                ),
            ));
        }

        if input.classes.len() > t.max_classes_per_file {
            issues.push(Issue::new(
                Severity::Info,
                Category::Smell,
                format!(
                    "file has {} classes, exceeds maximum of {}",
                    input.classes.len(),
                    t.max_classes_per_file
                ),
            ));
        }

        issues
    }
}

/// Flags functions whose span exceeds the line limit.
pub struct LongFunctionDetector {
    max_lines: usize,
}

impl LongFunctionDetector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_lines: thresholds.max_function_lines,
        }
    }
}

impl Detector for LongFunctionDetector {
    fn name(&self) -> &'static str {
        "long_function"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        input
            .functions
            .iter()
            .filter(|f| f.span_lines() > self.max_lines)
            .map(|f| {
                Issue::new(
                    Severity::Warning,
                    Category::Smell,
                    format!(
                        "function '{}' has {} lines, exceeds maximum of {}",
                        f.name,
                        f.span_lines(),
                        self.max_lines
                    ),
                )
                .at_line(f.line)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClassInfo, FunctionInfo};

    fn function(name: &str, line: usize, end_line: usize) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            line,
            end_line,
            complexity: 1,
            nesting: 0,
        }
    }

    fn input<'a>(
        loc: usize,
        functions: &'a [FunctionInfo],
        classes: &'a [ClassInfo],
    ) -> DetectionInput<'a> {
        DetectionInput {
            language: "text",
            text: "",
            lines: Vec::new(),
            lines_of_code: loc,
            functions,
            classes,
            comment_prefixes: &[],
            language_rules: &[],
        }
    }

    #[test]
    fn test_small_file_passes() {
        let detector = SizeDetector::new(Thresholds::default());
        let functions = vec![function("a", 1, 3)];
        assert!(detector.detect(&input(40, &functions, &[])).is_empty());
    }

    #[test]
    fn test_long_file_and_many_functions() {
        let thresholds = Thresholds {
            max_file_lines: 10,
            max_functions_per_file: 1,
            ..Thresholds::default()
        };
        let detector = SizeDetector::new(thresholds);
        let functions = vec![function("a", 1, 3), function("b", 4, 6)];
        let issues = detector.detect(&input(11, &functions, &[]));

        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.line.is_none()));
        assert!(issues[0].message.contains("11 lines of code"));
        assert!(issues[1].message.contains("2 functions"));
    }

    #[test]
    fn test_long_function_flagged_at_declaration() {
        let detector = LongFunctionDetector::new(&Thresholds::default());
        let functions = vec![function("short", 1, 10), function("long", 20, 80)];
        let issues = detector.detect(&input(80, &functions, &[]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(20));
        assert!(issues[0].message.contains("'long' has 61 lines"));
    }

    #[test]
    fn test_threshold_presets_are_ordered() {
        let strict = Thresholds::strict();
        let default = Thresholds::default();
        let relaxed = Thresholds::relaxed();
        assert!(strict.max_file_lines < default.max_file_lines);
        assert!(default.max_file_lines < relaxed.max_file_lines);
    }
}
