//! Python analysis: tree-sitter strategy with an indentation-based twin.

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::treesitter::{StructuralSpec, TreeSitterAnalyzer};
use super::AnalyzerRegistry;

const EXTENSIONS: &[&str] = &["py", "pyw", "pyi"];

/// Captures:
/// - `func_name`/`function`: function_definition (methods included)
/// - `class_name`/`class`: class_definition
const DECLARATION_QUERY: &str = r#"
(function_definition name: (identifier) @func_name) @function
(class_definition name: (identifier) @class_name) @class
"#;

const IMPORT_QUERY: &str = r#"
(import_statement name: (dotted_name) @import_path)
(import_statement name: (aliased_import name: (dotted_name) @import_path))
(import_from_statement module_name: (dotted_name) @import_path)
(import_from_statement module_name: (relative_import) @import_path)
"#;

/// Counts if/elif, loops, except clauses, with statements, conditional
/// expressions, boolean operators and comprehensions.
const BRANCH_QUERY: &str = r#"
(if_statement) @branch
(elif_clause) @branch
(for_statement) @branch
(while_statement) @branch
(except_clause) @branch
(with_statement) @branch
(conditional_expression) @branch
(boolean_operator operator: "and") @branch
(boolean_operator operator: "or") @branch
(list_comprehension) @branch
(dictionary_comprehension) @branch
(set_comprehension) @branch
(generator_expression) @branch
"#;

const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "match_statement",
];

static RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\beval\s*\(",
        "use of eval(): potential code injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\bexec\s*\(",
        "use of exec(): potential code injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"__import__\s*\(",
        "dynamic import via __import__()",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"shell\s*=\s*True",
        "subprocess call with shell=True: potential shell injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r#"(?i)["'][^"']*\b(select|insert|update|delete)\b[^"']*%[sd]?[^"']*["']\s*%"#,
        "SQL built with string formatting: potential SQL injection",
        Severity::Critical,
        Category::Security,
    )
    .in_strings(),
    PatternRule::new(
        r"\bpickle\.loads?\s*\(",
        "unpickling data can execute arbitrary code",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"^\s*except\s*:",
        "bare except clause",
        Severity::Warning,
        Category::Smell,
    ),
    PatternRule::new(
        r"^\s*print\s*\(",
        "print() call; consider logging",
        Severity::Info,
        Category::Style,
    ),
];

fn structural() -> StructuralSpec {
    StructuralSpec {
        id: "python",
        extensions: EXTENSIONS,
        comment_prefixes: &["#"],
        declaration_query: DECLARATION_QUERY,
        import_query: IMPORT_QUERY,
        branch_query: BRANCH_QUERY,
        nesting_kinds: NESTING_KINDS,
        rules: RULES,
    }
}

fn heuristic() -> HeuristicSpec {
    HeuristicSpec {
        id: "python",
        extensions: EXTENSIONS,
        comment_prefixes: &["#"],
        function_patterns: &[r"^\s*(?:async\s+)?def\s+(?P<name>\w+)\s*\("],
        class_patterns: &[r"^\s*class\s+(?P<name>\w+)"],
        import_patterns: &[
            r"^\s*import\s+(?P<path>[\w.]+)",
            r"^\s*from\s+(?P<path>[\w.]+)\s+import\b",
        ],
        decision_pattern: r"\b(if|elif|for|while|except|with|and|or)\b",
        nesting_pattern: r"^\s*(?:async\s+)?(if|for|while|try|with|match)\b",
        block_style: BlockStyle::Indentation,
        rules: RULES,
    }
}

/// Register the Python strategy and its fallback.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_python::LANGUAGE.into(),
        structural(),
    )?));
    registry.register_fallback(Box::new(HeuristicAnalyzer::new(heuristic())?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LanguageAnalyzer, ParsedSource};

    fn analyzer() -> TreeSitterAnalyzer {
        TreeSitterAnalyzer::new(tree_sitter_python::LANGUAGE.into(), structural()).unwrap()
    }

    const SOURCE: &str = r#"
import os
import json as j
from collections import OrderedDict
from . import sibling

class Greeter:
    def greet(self, name):
        if name and name.strip():
            return "hi " + name
        return "hi"

def walk(items):
    for item in items:
        if item:
            while item > 0:
                if item % 2:
                    item -= 1
                item -= 1
    return [i for i in items]
"#;

    #[test]
    fn test_python_declarations() {
        let analyzer = analyzer();
        let parsed = analyzer.parse(SOURCE).unwrap();

        let functions = analyzer.extract_functions(&parsed);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "walk"]);
        assert_eq!(functions[0].line, 8);
        assert_eq!(functions[0].end_line, 11);

        let classes = analyzer.extract_classes(&parsed);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Greeter");
        assert_eq!(classes[0].line, 7);
    }

    #[test]
    fn test_python_imports_in_order() {
        let analyzer = analyzer();
        let parsed = analyzer.parse(SOURCE).unwrap();
        assert_eq!(
            analyzer.extract_imports(&parsed),
            vec!["os", "json", "collections", "."]
        );
    }

    #[test]
    fn test_python_complexity_and_nesting() {
        let analyzer = analyzer();
        let parsed = analyzer.parse(SOURCE).unwrap();
        let functions = analyzer.extract_functions(&parsed);

        // greet: if + and
        assert_eq!(functions[0].complexity, 3);
        assert_eq!(functions[0].nesting, 1);
        // walk: for, if, while, if, comprehension
        assert_eq!(functions[1].complexity, 6);
        assert_eq!(functions[1].nesting, 4);
    }

    #[test]
    fn test_python_syntax_error_rejected() {
        let analyzer = analyzer();
        assert!(analyzer.parse("def broken(:\n    pass\n").is_err());
    }

    #[test]
    fn test_heuristic_twin_agrees_on_names() {
        let twin = HeuristicAnalyzer::new(heuristic()).unwrap();
        let parsed = ParsedSource::plain(SOURCE);
        let names: Vec<_> = twin
            .extract_functions(&parsed)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["greet", "walk"]);
        assert_eq!(
            twin.extract_imports(&parsed),
            vec!["os", "json", "collections", "."]
        );
    }
}
