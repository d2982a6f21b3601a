//! Detection module for quality issues in code.

mod complexity;
mod docs;
mod patterns;
mod runner;
mod size;
mod types;

pub use complexity::{ComplexFunctionDetector, DeepNestingDetector};
pub use docs::MissingDocsDetector;
pub use patterns::{compile_rules, CompiledRule, PatternRule, SuspiciousPatternDetector, COMMON_RULES};
pub use runner::{DetectionInput, Detector, DetectorSet};
pub use size::{LongFunctionDetector, SizeDetector, Thresholds};
pub use types::{sort_by_line, Category, Issue, Severity};
