//! Directory-level aggregation of per-file analyses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::{FileError, WalkItem};
use crate::analysis::AnalysisResult;
use crate::detect::{Issue, Severity};

/// Totals for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub files: usize,
    pub lines: usize,
    pub functions: usize,
    pub classes: usize,
}

/// A file ranked by complexity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileScore {
    pub path: PathBuf,
    pub language: String,
    pub complexity_score: f64,
    pub lines_of_code: usize,
}

/// An issue with the file it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIssue {
    pub path: PathBuf,
    #[serde(flatten)]
    pub issue: Issue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssuesBySeverity {
    pub critical: Vec<FileIssue>,
    pub warning: Vec<FileIssue>,
    pub info: Vec<FileIssue>,
}

impl IssuesBySeverity {
    pub fn total(&self) -> usize {
        self.critical.len() + self.warning.len() + self.info.len()
    }

    /// Groups in severity order, most severe first.
    pub fn groups(&self) -> [(Severity, &[FileIssue]); 3] {
        [
            (Severity::Critical, self.critical.as_slice()),
            (Severity::Warning, self.warning.as_slice()),
            (Severity::Info, self.info.as_slice()),
        ]
    }
}

/// A file left out by the filters after it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregated analysis of a directory tree. Paths are relative to `root`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReport {
    pub root: PathBuf,
    pub total_files: usize,
    pub total_lines: usize,
    pub languages: BTreeMap<String, LanguageStats>,
    pub most_complex: Vec<FileScore>,
    pub issues: IssuesBySeverity,
    pub errors: Vec<FileError>,
    pub skipped: Vec<SkippedFile>,
    pub degraded_files: usize,
    pub cache_hits: usize,
    pub cancelled: bool,
}

/// Accumulates walk outcomes and produces a sorted report.
pub(crate) struct ReportBuilder {
    root: PathBuf,
    top_n: usize,
    files: Vec<(PathBuf, Arc<AnalysisResult>)>,
    errors: Vec<FileError>,
    skipped: Vec<SkippedFile>,
    cache_hits: usize,
    cancelled: bool,
}

impl ReportBuilder {
    pub(crate) fn new(root: &Path, top_n: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            top_n,
            files: Vec::new(),
            errors: Vec::new(),
            skipped: Vec::new(),
            cache_hits: 0,
            cancelled: false,
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => path.to_path_buf(),
        }
    }

    pub(crate) fn add(&mut self, item: WalkItem) {
        match item {
            WalkItem::Analyzed(analysis) => {
                if analysis.cache_hit {
                    self.cache_hits += 1;
                }
                let rel = self.relative(&analysis.path);
                self.files.push((rel, analysis.result));
            }
            WalkItem::Skipped { path, reason } => {
                let path = self.relative(&path);
                self.skipped.push(SkippedFile { path, reason });
            }
            WalkItem::Failed(mut err) => {
                err.path = self.relative(&err.path);
                self.errors.push(err);
            }
        }
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn finish(mut self) -> ProjectReport {
        self.files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut languages: BTreeMap<String, LanguageStats> = BTreeMap::new();
        let mut issues = IssuesBySeverity::default();
        let mut total_lines = 0;
        let mut degraded_files = 0;

        for (path, result) in &self.files {
            total_lines += result.lines_of_code;
            if result.degraded {
                degraded_files += 1;
            }

            let stats = languages.entry(result.language.clone()).or_default();
            stats.files += 1;
            stats.lines += result.lines_of_code;
            stats.functions += result.functions.len();
            stats.classes += result.classes.len();

            for issue in &result.issues {
                let bucket = match issue.severity {
                    Severity::Critical => &mut issues.critical,
                    Severity::Warning => &mut issues.warning,
                    Severity::Info => &mut issues.info,
                };
                bucket.push(FileIssue {
                    path: path.clone(),
                    issue: issue.clone(),
                });
            }
        }

        for bucket in [&mut issues.critical, &mut issues.warning, &mut issues.info] {
            bucket.sort_by(|a, b| {
                a.path
                    .cmp(&b.path)
                    .then(a.issue.line.cmp(&b.issue.line))
                    .then_with(|| a.issue.message.cmp(&b.issue.message))
            });
        }

        let mut most_complex: Vec<FileScore> = self
            .files
            .iter()
            .map(|(path, result)| FileScore {
                path: path.clone(),
                language: result.language.clone(),
                complexity_score: result.complexity_score,
                lines_of_code: result.lines_of_code,
            })
            .collect();
        most_complex.sort_by(|a, b| {
            b.complexity_score
                .total_cmp(&a.complexity_score)
                .then_with(|| a.path.cmp(&b.path))
        });
        most_complex.truncate(self.top_n);

        self.errors.sort_by(|a, b| a.path.cmp(&b.path));
        self.skipped.sort_by(|a, b| a.path.cmp(&b.path));

        ProjectReport {
            root: self.root,
            total_files: self.files.len(),
            total_lines,
            languages,
            most_complex,
            issues,
            errors: self.errors,
            skipped: self.skipped,
            degraded_files,
            cache_hits: self.cache_hits,
            cancelled: self.cancelled,
        }
    }
}
