//! Lazy directory walking with extension, ignore and size filters.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use super::FileError;
use crate::analysis::{AnalysisEngine, FileAnalysis};

/// Directory and file names skipped unless overridden.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "vendor",
];

/// Which files a tree walk considers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkFilters {
    /// Extensions to analyze (without dot). Empty means every extension a
    /// strategy is registered for.
    pub extensions: Vec<String>,
    /// Globs matched against entry names and root-relative paths.
    pub ignore: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_bytes: Option<u64>,
}

impl Default for WalkFilters {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            ignore: DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: None,
        }
    }
}

/// Filters with globs compiled and extensions resolved.
pub(crate) struct CompiledFilters {
    extensions: HashSet<String>,
    ignore: GlobSet,
    max_file_bytes: Option<u64>,
}

impl CompiledFilters {
    pub(crate) fn new(filters: &WalkFilters, registered: Vec<String>) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &filters.ignore {
            let glob = Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid ignore pattern {:?}: {}", pattern, e))?;
            builder.add(glob);
        }

        let extensions = if filters.extensions.is_empty() {
            registered
        } else {
            filters.extensions.clone()
        };

        Ok(Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ignore: builder.build()?,
            max_file_bytes: filters.max_file_bytes,
        })
    }

    fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .is_some_and(|name| self.ignore.is_match(Path::new(name)));
        by_name
            || path
                .strip_prefix(root)
                .is_ok_and(|rel| !rel.as_os_str().is_empty() && self.ignore.is_match(rel))
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_ascii_lowercase()))
    }
}

/// A file the walk decided about, before analysis.
#[derive(Debug)]
pub(crate) enum Candidate {
    File(PathBuf),
    Skipped { path: PathBuf, reason: String },
    Failed(FileError),
}

/// Eligible files under `root` in file-name order, lazily.
pub(crate) fn candidates(
    root: &Path,
    filters: Arc<CompiledFilters>,
) -> Box<dyn Iterator<Item = Candidate> + Send> {
    let walk_root = root.to_path_buf();
    let entry_filters = Arc::clone(&filters);

    let entries = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !entry_filters.is_ignored(&walk_root, e.path()));

    Box::new(entries.filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return Some(Candidate::Failed(FileError::from_walk(&err))),
        };
        if !entry.file_type().is_file() || !filters.wants(entry.path()) {
            return None;
        }

        if let Some(max) = filters.max_file_bytes {
            match entry.metadata() {
                Ok(meta) if meta.len() > max => {
                    debug!(path = %entry.path().display(), size = meta.len(), "skipping large file");
                    return Some(Candidate::Skipped {
                        path: entry.into_path(),
                        reason: format!("larger than {} bytes", max),
                    });
                }
                Ok(_) => {}
                Err(err) => return Some(Candidate::Failed(FileError::from_walk(&err))),
            }
        }

        Some(Candidate::File(entry.into_path()))
    }))
}

/// One step of a project walk.
#[derive(Debug)]
pub enum WalkItem {
    Analyzed(FileAnalysis),
    Skipped { path: PathBuf, reason: String },
    Failed(FileError),
}

impl WalkItem {
    pub fn path(&self) -> &Path {
        match self {
            WalkItem::Analyzed(a) => &a.path,
            WalkItem::Skipped { path, .. } => path,
            WalkItem::Failed(e) => &e.path,
        }
    }
}

/// Lazy iterator over analyzed files. Dropping it stops the walk; nothing
/// beyond the last consumed file is read.
pub struct ProjectWalk<'a> {
    engine: &'a AnalysisEngine,
    candidates: Box<dyn Iterator<Item = Candidate> + Send>,
}

impl<'a> ProjectWalk<'a> {
    pub(crate) fn new(
        engine: &'a AnalysisEngine,
        candidates: Box<dyn Iterator<Item = Candidate> + Send>,
    ) -> Self {
        Self { engine, candidates }
    }
}

impl Iterator for ProjectWalk<'_> {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        let item = match self.candidates.next()? {
            Candidate::File(path) => match self.engine.analyze_file(&path) {
                Ok(analysis) => WalkItem::Analyzed(analysis),
                Err(err) => {
                    debug!(error = %err, "skipping unreadable file");
                    WalkItem::Failed(err)
                }
            },
            Candidate::Skipped { path, reason } => WalkItem::Skipped { path, reason },
            Candidate::Failed(err) => {
                debug!(error = %err, "skipping unwalkable entry");
                WalkItem::Failed(err)
            }
        };
        Some(item)
    }
}
