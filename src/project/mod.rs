//! Directory-tree analysis.
//!
//! Walks a root with extension, ignore and size filters, analyzes each
//! eligible file through the engine (and so through the shared cache) and
//! aggregates the outcomes into a [`ProjectReport`]. Unreadable files become
//! [`FileError`]s; a batch never aborts on one file.

mod error;
mod report;
mod walk;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::analysis::AnalysisEngine;

pub use error::{FileError, FileErrorKind};
pub use report::{FileIssue, FileScore, IssuesBySeverity, LanguageStats, ProjectReport, SkippedFile};
pub use walk::{ProjectWalk, WalkFilters, WalkItem, DEFAULT_IGNORES};

use report::ReportBuilder;
use walk::{candidates, Candidate, CompiledFilters};

/// Shared flag checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Walk progress, reported after each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub current: PathBuf,
}

/// Runs tree walks against an engine.
pub struct ProjectAggregator<'a> {
    engine: &'a AnalysisEngine,
    top_n: usize,
}

impl<'a> ProjectAggregator<'a> {
    pub fn new(engine: &'a AnalysisEngine) -> Self {
        Self { engine, top_n: 10 }
    }

    /// Number of files kept in the complexity ranking.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    fn compile(&self, filters: &WalkFilters) -> anyhow::Result<Arc<CompiledFilters>> {
        Ok(Arc::new(CompiledFilters::new(
            filters,
            self.engine.registry().extensions(),
        )?))
    }

    /// Lazy per-file outcomes under `root`.
    pub fn walk(&self, root: &Path, filters: &WalkFilters) -> anyhow::Result<ProjectWalk<'a>> {
        let filters = self.compile(filters)?;
        Ok(ProjectWalk::new(self.engine, candidates(root, filters)))
    }

    /// Analyze every eligible file under `root`.
    pub fn analyze_tree(&self, root: &Path, filters: &WalkFilters) -> anyhow::Result<ProjectReport> {
        self.analyze_tree_with(root, filters, &CancellationToken::new(), |_| {})
    }

    /// Like [`analyze_tree`](Self::analyze_tree), checking `cancel` between
    /// files. A cancelled walk returns the partial report with `cancelled`
    /// set.
    pub fn analyze_tree_with<F>(
        &self,
        root: &Path,
        filters: &WalkFilters,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> anyhow::Result<ProjectReport>
    where
        F: FnMut(Progress),
    {
        let mut builder = ReportBuilder::new(root, self.top_n);
        let mut processed = 0;

        let mut walk = self.walk(root, filters)?;
        loop {
            if cancel.is_cancelled() {
                info!(processed, "project walk cancelled");
                builder.mark_cancelled();
                break;
            }
            let Some(item) = walk.next() else { break };
            let current = item.path().to_path_buf();
            builder.add(item);
            processed += 1;
            progress(Progress { processed, current });
        }

        let report = builder.finish();
        debug!(
            root = %root.display(),
            files = report.total_files,
            errors = report.errors.len(),
            hits = report.cache_hits,
            "project analyzed"
        );
        Ok(report)
    }

    /// Analyze with rayon workers. The report is identical to the
    /// sequential one.
    pub fn analyze_tree_parallel(
        &self,
        root: &Path,
        filters: &WalkFilters,
    ) -> anyhow::Result<ProjectReport> {
        let found: Vec<Candidate> = candidates(root, self.compile(filters)?).collect();

        let items: Vec<WalkItem> = found
            .into_par_iter()
            .map(|candidate| match candidate {
                Candidate::File(path) => match self.engine.analyze_file(&path) {
                    Ok(analysis) => WalkItem::Analyzed(analysis),
                    Err(err) => WalkItem::Failed(err),
                },
                Candidate::Skipped { path, reason } => WalkItem::Skipped { path, reason },
                Candidate::Failed(err) => WalkItem::Failed(err),
            })
            .collect();

        let mut builder = ReportBuilder::new(root, self.top_n);
        for item in items {
            builder.add(item);
        }
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AnalysisCache;
    use crate::detect::Thresholds;
    use tempfile::TempDir;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::with_defaults(&Thresholds::default(), Arc::new(AnalysisCache::new(64)))
            .unwrap()
    }

    fn sample_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        for i in 0..5 {
            std::fs::write(
                temp.path().join(format!("mod_{}.py", i)),
                format!("def f{}():\n    \"\"\"Doc.\"\"\"\n    return {}\n", i, i),
            )
            .unwrap();
        }
        temp
    }

    #[test]
    fn test_walk_is_lazy() {
        let temp = sample_tree();
        let engine = engine();
        let aggregator = ProjectAggregator::new(&engine);

        let taken: Vec<_> = aggregator
            .walk(temp.path(), &WalkFilters::default())
            .unwrap()
            .take(2)
            .collect();

        assert_eq!(taken.len(), 2);
        assert_eq!(engine.cache().stats().computations, 2);
    }

    #[test]
    fn test_cancellation_returns_partial_report() {
        let temp = sample_tree();
        let engine = engine();
        let aggregator = ProjectAggregator::new(&engine);
        let cancel = CancellationToken::new();

        let mut seen = Vec::new();
        let report = aggregator
            .analyze_tree_with(temp.path(), &WalkFilters::default(), &cancel, |p| {
                seen.push(p.processed);
                if p.processed == 3 {
                    cancel.cancel();
                }
            })
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_files, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let temp = sample_tree();
        let engine = engine();
        let aggregator = ProjectAggregator::new(&engine).with_top_n(3);

        let parallel = aggregator
            .analyze_tree_parallel(temp.path(), &WalkFilters::default())
            .unwrap();
        let sequential = aggregator
            .analyze_tree(temp.path(), &WalkFilters::default())
            .unwrap();

        assert_eq!(parallel.total_files, 5);
        assert_eq!(parallel.most_complex, sequential.most_complex);
        assert_eq!(parallel.languages, sequential.languages);
        assert_eq!(parallel.issues, sequential.issues);
        assert_eq!(parallel.cache_hits, 0);
        assert_eq!(sequential.cache_hits, 5);
        assert_eq!(engine.cache().stats().computations, 5);
    }

    #[test]
    fn test_missing_root_is_an_error_entry() {
        let engine = engine();
        let report = ProjectAggregator::new(&engine)
            .analyze_tree(Path::new("/definitely/not/here"), &WalkFilters::default())
            .unwrap();
        assert_eq!(report.total_files, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, FileErrorKind::NotFound);
    }
}
