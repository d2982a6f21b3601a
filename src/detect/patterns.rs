//! Detection of suspicious patterns in code.
//!
//! Rules are plain regexes tagged with a severity and category. A set of
//! common rules applies to every file; each language strategy contributes
//! its own security and smell rules on top.

use regex::Regex;

use super::{Category, DetectionInput, Detector, Issue, Severity};

/// Static description of a pattern rule.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub pattern: &'static str,
    pub message: &'static str,
    pub severity: Severity,
    pub category: Category,
    /// Also match inside string literals (for rules about string contents).
    pub in_strings: bool,
}

impl PatternRule {
    pub const fn new(
        pattern: &'static str,
        message: &'static str,
        severity: Severity,
        category: Category,
    ) -> Self {
        Self {
            pattern,
            message,
            severity,
            category,
            in_strings: false,
        }
    }

    pub const fn in_strings(mut self) -> Self {
        self.in_strings = true;
        self
    }
}

/// Pre-compiled pattern with metadata.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    message: &'static str,
    severity: Severity,
    category: Category,
    in_strings: bool,
}

impl CompiledRule {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Compile a rule table.
pub fn compile_rules(rules: &[PatternRule]) -> anyhow::Result<Vec<CompiledRule>> {
    rules
        .iter()
        .map(|r| {
            let regex = Regex::new(r.pattern)
                .map_err(|e| anyhow::anyhow!("compiling pattern {:?}: {}", r.pattern, e))?;
            Ok(CompiledRule {
                regex,
                message: r.message,
                severity: r.severity,
                category: r.category,
                in_strings: r.in_strings,
            })
        })
        .collect()
}

/// Rules that apply regardless of language.
pub static COMMON_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\b(TODO|FIXME|XXX)\b",
        "unfinished work markers (TODO/FIXME)",
        Severity::Info,
        Category::Smell,
    ),
    PatternRule::new(
        r#"(?i)\b(password|passwd|secret|api_key|apikey|token)\s*[:=]\s*["'][^"']{4,}["']"#,
        "hardcoded credential",
        Severity::Warning,
        Category::Security,
    ),
];

/// Flags the first occurrence of each rule in a file.
pub struct SuspiciousPatternDetector {
    common: Vec<CompiledRule>,
}

impl SuspiciousPatternDetector {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            common: compile_rules(COMMON_RULES)?,
        })
    }

    fn scan(&self, rule: &CompiledRule, input: &DetectionInput) -> Option<Issue> {
        let mut first_line = None;
        let mut occurrences = 0usize;

        for (idx, line) in input.lines.iter().enumerate() {
            for mat in rule.regex.find_iter(line) {
                if !rule.in_strings && is_inside_string_literal(line, mat.start()) {
                    continue;
                }
                occurrences += 1;
                first_line.get_or_insert(idx + 1);
            }
        }

        let line = first_line?;
        let message = if occurrences > 1 {
            format!("{} ({} occurrences)", rule.message, occurrences)
        } else {
            rule.message.to_string()
        };
        Some(Issue::new(rule.severity, rule.category, message).at_line(line))
    }
}

impl Detector for SuspiciousPatternDetector {
    fn name(&self) -> &'static str {
        "suspicious_pattern"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        self.common
            .iter()
            .chain(input.language_rules.iter())
            .filter_map(|rule| self.scan(rule, input))
            .collect()
    }
}

/// Check if a byte position in a line falls within a string literal.
/// Supports double-quoted, single-quoted, and backtick strings with escape handling.
fn is_inside_string_literal(line: &str, pos: usize) -> bool {
    let mut in_string = false;
    let mut string_char = None;
    let mut escaped = false;

    for (i, ch) in line.char_indices() {
        if i >= pos {
            return in_string;
        }

        if escaped {
            escaped = false;
            continue;
        }

        if ch == '\\' && in_string {
            escaped = true;
            continue;
        }

        if ch == '"' || ch == '\'' || ch == '`' {
            if !in_string {
                in_string = true;
                string_char = Some(ch);
            } else if Some(ch) == string_char {
                in_string = false;
                string_char = None;
            }
        }
    }

    in_string
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(text: &'a str, rules: &'a [CompiledRule]) -> DetectionInput<'a> {
        DetectionInput {
            language: "python",
            text,
            lines: text.lines().collect(),
            lines_of_code: text.lines().count(),
            functions: &[],
            classes: &[],
            comment_prefixes: &["#"],
            language_rules: rules,
        }
    }

    #[test]
    fn test_todo_marker_reported_once_with_count() {
        let marker = "TODO";
        let text = format!("x = 1\n# {}: one\n# {}: two\n", marker, marker);
        let detector = SuspiciousPatternDetector::new().unwrap();
        let issues = detector.detect(&input(&text, &[]));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert_eq!(issues[0].category, Category::Smell);
        assert!(issues[0].message.contains("2 occurrences"));
    }

    #[test]
    fn test_skip_pattern_in_string() {
        let rules = compile_rules(&[PatternRule::new(
            r"\beval\s*\(",
            "eval",
            Severity::Critical,
            Category::Security,
        )])
        .unwrap();
        let text = "msg = \"eval(x) is bad\"\n";
        let detector = SuspiciousPatternDetector::new().unwrap();
        assert!(detector.detect(&input(text, &rules)).is_empty());

        let text = "result = eval(user_input)\n";
        let issues = detector.detect(&input(text, &rules));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_in_strings_rule_matches_literals() {
        let rules = compile_rules(&[PatternRule::new(
            r"(?i)select .*%s",
            "sql formatting",
            Severity::Critical,
            Category::Security,
        )
        .in_strings()])
        .unwrap();
        let text = "cur.execute(\"SELECT * FROM t WHERE id = %s\" % uid)\n";
        let detector = SuspiciousPatternDetector::new().unwrap();
        assert_eq!(detector.detect(&input(text, &rules)).len(), 1);
    }

    #[test]
    fn test_is_inside_string_literal() {
        assert!(!is_inside_string_literal("hello world", 0));
        assert!(is_inside_string_literal(r#""hello world""#, 3));
        assert!(!is_inside_string_literal(r#""hello" world"#, 9));
        assert!(is_inside_string_literal(r#""hello \" world""#, 10));
    }
}
