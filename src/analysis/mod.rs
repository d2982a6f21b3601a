//! Source code analysis.
//!
//! Extracts structure (functions, classes, imports), metrics (lines of code,
//! complexity) and issues from a single source text.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   detect    ┌──────────────────┐   parse/extract   ┌────────────────┐
//! │ Source file │────────────▶│ AnalyzerRegistry │──────────────────▶│ AnalysisResult │
//! └─────────────┘             │ (tag → strategy) │                   │ (+ detectors)  │
//!                             └──────────────────┘                   └────────────────┘
//!                                      │ parse error                          │
//!                                      ▼                                      ▼
//!                             ┌──────────────────┐                   ┌────────────────┐
//!                             │ heuristic twin   │                   │ AnalysisCache  │
//!                             └──────────────────┘                   └────────────────┘
//! ```

mod engine;
mod facts;
mod languages;
mod traits;

pub use engine::{AnalysisEngine, FileAnalysis};
pub use facts::{
    complexity_score, count_code_lines, AnalysisResult, ClassInfo, FunctionInfo, TEXT_LANGUAGE,
};
pub use languages::{
    AnalyzerRegistry, BlockStyle, HeuristicAnalyzer, HeuristicSpec, StructuralSpec,
    TreeSitterAnalyzer,
};
pub use traits::{LanguageAnalyzer, ParsedSource};
