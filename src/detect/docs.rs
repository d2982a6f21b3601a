//! Missing documentation on public functions.

use super::{Category, DetectionInput, Detector, Issue, Severity};

/// Flags functions with no docstring or leading doc comment.
///
/// Functions named with a leading underscore and test functions are skipped.
pub struct MissingDocsDetector;

impl Detector for MissingDocsDetector {
    fn name(&self) -> &'static str {
        "missing_docs"
    }

    fn detect(&self, input: &DetectionInput) -> Vec<Issue> {
        input
            .functions
            .iter()
            .filter(|f| !is_exempt(&f.name))
            .filter(|f| {
                let idx = f.line.saturating_sub(1);
                if input.language == "python" {
                    !has_docstring(&input.lines, idx)
                } else {
                    !has_leading_comment(&input.lines, idx, input.comment_prefixes)
                }
            })
            .map(|f| {
                Issue::new(
                    Severity::Info,
                    Category::Style,
                    format!("function '{}' has no documentation", f.name),
                )
                .at_line(f.line)
            })
            .collect()
    }
}

fn is_exempt(name: &str) -> bool {
    name.starts_with('_') || name.starts_with("test") || name.starts_with("Test")
}

/// Python: the first statement after the signature is a string literal.
fn has_docstring(lines: &[&str], decl_idx: usize) -> bool {
    // Signatures may span several lines; the body starts after the line
    // that ends with ':'.
    let body_start = lines
        .iter()
        .enumerate()
        .skip(decl_idx)
        .find(|(_, l)| l.trim_end().ends_with(':'))
        .map(|(i, _)| i + 1);

    let Some(start) = body_start else {
        return false;
    };

    lines
        .iter()
        .skip(start)
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(|l| {
            let l = l.trim_start_matches(['r', 'u', 'b', 'R', 'U', 'B']);
            l.starts_with("\"\"\"") || l.starts_with("'''") || l.starts_with('"') || l.starts_with('\'')
        })
        .unwrap_or(false)
}

/// Other languages: a comment directly above the declaration, looking past
/// attribute and decorator lines.
fn has_leading_comment(lines: &[&str], decl_idx: usize, prefixes: &[&str]) -> bool {
    for line in lines[..decl_idx.min(lines.len())].iter().rev() {
        let trimmed = line.trim();
        if trimmed.starts_with('@') || trimmed.starts_with("#[") {
            continue;
        }
        return trimmed.ends_with("*/")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || prefixes.iter().any(|p| trimmed.starts_with(p));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FunctionInfo;

    fn function(name: &str, line: usize) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            line,
            end_line: line + 2,
            complexity: 1,
            nesting: 0,
        }
    }

    fn run(language: &str, text: &str, functions: &[FunctionInfo], prefixes: &[&'static str]) -> Vec<Issue> {
        let input = DetectionInput {
            language,
            text,
            lines: text.lines().collect(),
            lines_of_code: text.lines().count(),
            functions,
            classes: &[],
            comment_prefixes: prefixes,
            language_rules: &[],
        };
        MissingDocsDetector.detect(&input)
    }

    #[test]
    fn test_python_docstrings() {
        let text = "def documented():\n    \"\"\"Does things.\"\"\"\n    pass\n\ndef bare():\n    pass\n\ndef _hidden():\n    pass\n";
        let functions = vec![function("documented", 1), function("bare", 5), function("_hidden", 8)];
        let issues = run("python", text, &functions, &["#"]);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(5));
        assert_eq!(issues[0].category, Category::Style);
        assert_eq!(issues[0].severity, Severity::Info);
    }

    #[test]
    fn test_leading_comment_past_attributes() {
        let text = "/// Adds.\n#[inline]\nfn add() {}\n\nfn sub() {}\n\n#[test]\nfn test_add() {}\n";
        let functions = vec![function("add", 3), function("sub", 5), function("test_add", 8)];
        let issues = run("rust", text, &functions, &["//"]);

        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'sub'"));
    }

    #[test]
    fn test_block_comment_counts() {
        let text = "/**\n * Greets.\n */\nfunction greet() {}\n";
        let functions = vec![function("greet", 4)];
        assert!(run("javascript", text, &functions, &["//"]).is_empty());
    }
}
