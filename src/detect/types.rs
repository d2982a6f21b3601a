//! Core types for detection results.

use serde::{Deserialize, Serialize};

/// Severity levels for issues.
///
/// Ordering is most severe first so that grouped output lists critical
/// findings before warnings and informational notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// What kind of problem an issue describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Style,
    Security,
    Complexity,
    Smell,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Style => "style",
            Category::Security => "security",
            Category::Complexity => "complexity",
            Category::Smell => "smell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "style" => Some(Category::Style),
            "security" => Some(Category::Security),
            "complexity" => Some(Category::Complexity),
            "smell" => Some(Category::Smell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding produced by a detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    /// 1-indexed line, `None` for file-level findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Issue {
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Create a unique key for this issue (for deduplication/comparison).
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.category, self.severity, self.message)
    }
}

/// Sort issues into source order, keeping file-level findings first.
///
/// The sort is stable, so issues on the same line keep detector order.
pub fn sort_by_line(issues: &mut [Issue]) {
    issues.sort_by_key(|i| i.line.unwrap_or(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        let mut severities = vec![Severity::Info, Severity::Critical, Severity::Warning];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Warning, Severity::Info]
        );
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("Critical".parse::<Severity>(), Ok(Severity::Critical));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_sort_by_line_is_stable() {
        let mut issues = vec![
            Issue::new(Severity::Info, Category::Style, "b").at_line(3),
            Issue::new(Severity::Warning, Category::Smell, "file"),
            Issue::new(Severity::Info, Category::Style, "a").at_line(3),
            Issue::new(Severity::Info, Category::Style, "c").at_line(1),
        ];
        sort_by_line(&mut issues);
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["file", "c", "b", "a"]);
    }
}
