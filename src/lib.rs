//! Sarek - terminal AI assistant core.
//!
//! Two local subsystems back the assistant:
//!
//! - **Code analysis**: content-addressed analysis of source files
//!   (structure, metrics, issues) through a per-fingerprint cache, with
//!   directory aggregation.
//! - **Conversation memory**: a durable, append-only ledger of turns per
//!   session, recency-based context selection and prompt assembly for the
//!   text-generation oracle.
//!
//! # Architecture
//!
//! - `analysis`: language strategies, the registry and the analysis engine
//! - `detect`: issue detectors run over extracted facts
//! - `cache`: the fingerprint-keyed analysis cache and its persisted layer
//! - `project`: directory walking and report aggregation
//! - `memory`: conversation store, sessions and context selection
//! - `prompt`, `oracle`, `assistant`: the question-and-answer flow
//! - `config`, `report`, `cli`: the binary's surface
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/`. Build a `StructuralSpec` or
//! `HeuristicSpec` and register it in `AnalyzerRegistry::with_defaults`.

pub mod analysis;
pub mod assistant;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod detect;
pub mod fingerprint;
pub mod memory;
pub mod oracle;
pub mod project;
pub mod prompt;
pub mod report;
pub mod schema;

pub use analysis::{AnalysisEngine, AnalysisResult, AnalyzerRegistry, FileAnalysis, LanguageAnalyzer};
pub use assistant::{Answer, Assistant, AssistantError};
pub use cache::{AnalysisCache, CacheStats, PersistedAnalyses};
pub use config::Config;
pub use db::{Database, StoreError};
pub use detect::{Category, Issue, Severity, Thresholds};
pub use fingerprint::Fingerprint;
pub use memory::{ContextSelector, ConversationStore, ConversationTurn, NewTurn, Role, SessionManager};
pub use oracle::{OllamaOracle, Oracle, OracleError};
pub use project::{CancellationToken, FileError, ProjectAggregator, ProjectReport, WalkFilters};
