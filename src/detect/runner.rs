//! Detection runner that orchestrates all checks.

use tracing::trace;

use crate::analysis::{ClassInfo, FunctionInfo};

use super::{
    ComplexFunctionDetector, CompiledRule, DeepNestingDetector, Issue, LongFunctionDetector,
    MissingDocsDetector, SizeDetector, SuspiciousPatternDetector, Thresholds,
};

/// Everything a detector may look at for one file.
pub struct DetectionInput<'a> {
    pub language: &'a str,
    pub text: &'a str,
    pub lines: Vec<&'a str>,
    pub lines_of_code: usize,
    pub functions: &'a [FunctionInfo],
    pub classes: &'a [ClassInfo],
    pub comment_prefixes: &'a [&'static str],
    /// Rules contributed by the language strategy.
    pub language_rules: &'a [CompiledRule],
}

/// An independent check producing zero or more issues.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, input: &DetectionInput) -> Vec<Issue>;
}

/// Ordered collection of detectors.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    /// The standard detectors, in reporting order.
    pub fn new(thresholds: &Thresholds) -> anyhow::Result<Self> {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(SizeDetector::new(thresholds.clone())),
            Box::new(LongFunctionDetector::new(thresholds)),
            Box::new(ComplexFunctionDetector::new(thresholds)),
            Box::new(DeepNestingDetector::new(thresholds)),
            Box::new(SuspiciousPatternDetector::new()?),
            Box::new(MissingDocsDetector),
        ];
        Ok(Self { detectors })
    }

    /// Build a set from explicit detectors.
    pub fn from_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Names of the detectors, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector and concatenate results in detector order.
    pub fn run(&self, input: &DetectionInput) -> Vec<Issue> {
        let mut issues = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(input);
            trace!(detector = detector.name(), count = found.len(), "detector finished");
            issues.extend(found);
        }
        issues
    }
}
