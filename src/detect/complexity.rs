//! Per-function complexity and nesting checks.

use super::{Category, DetectionInput, Detector, Issue, Severity, Thresholds};

/// Flags functions whose complexity exceeds the limit.
///
/// A function more than twice over the limit is critical.
pub struct ComplexFunctionDetector {
    max_complexity: u32,
}

impl ComplexFunctionDetector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_complexity: thresholds.max_function_complexity,
        }
    }
}

impl Detector for ComplexFunctionDetector {
    fn name(&self) -> &'static str {
        "complex_function"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        input
            .functions
            .iter()
            .filter(|f| f.complexity > self.max_complexity)
            .map(|f| {
                let severity = if f.complexity > self.max_complexity.saturating_mul(2) {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                Issue::new(
                    severity,
                    Category::Complexity,
                    format!(
                        "function '{}' has complexity {}, exceeds maximum of {}",
                        f.name, f.complexity, self.max_complexity
                    ),
                )
                .at_line(f.line)
            })
            .collect()
    }
}

/// Flags functions with deeply nested control flow.
pub struct DeepNestingDetector {
    max_depth: u32,
}

impl DeepNestingDetector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_depth: thresholds.max_nesting_depth,
        }
    }
}

impl Detector for DeepNestingDetector {
    fn name(&self) -> &'static str {
        "deep_nesting"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        input
            .functions
            .iter()
            .filter(|f| f.nesting > self.max_depth)
            .map(|f| {
                Issue::new(
                    Severity::Warning,
                    Category::Complexity,
                    format!(
                        "function '{}' nests control flow {} levels deep, exceeds maximum of {}",
                        f.name, f.nesting, self.max_depth
                    ),
                )
                .at_line(f.line)
            })
            .collect()
    }
}
