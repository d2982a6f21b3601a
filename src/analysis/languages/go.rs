//! Go analysis.

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::treesitter::{StructuralSpec, TreeSitterAnalyzer};
use super::AnalyzerRegistry;

const EXTENSIONS: &[&str] = &["go"];

const DECLARATION_QUERY: &str = r#"
(function_declaration name: (identifier) @func_name) @function
(method_declaration name: (field_identifier) @func_name) @function
(type_declaration (type_spec name: (type_identifier) @class_name type: [(struct_type) (interface_type)])) @class
"#;

const IMPORT_QUERY: &str = r#"
(import_spec path: (interpreted_string_literal) @import_path)
"#;

const BRANCH_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @branch
(communication_case) @branch
(expression_case) @branch
(type_case) @branch
(binary_expression operator: "&&") @branch
(binary_expression operator: "||") @branch
"#;

const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
];

static RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\bexec\.Command\s*\(",
        "spawns an external command; validate its arguments",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bpanic\s*\(",
        "panic() in library code",
        Severity::Info,
        Category::Smell,
    ),
];

fn structural() -> StructuralSpec {
    StructuralSpec {
        id: "go",
        extensions: EXTENSIONS,
        comment_prefixes: &["//"],
        declaration_query: DECLARATION_QUERY,
        import_query: IMPORT_QUERY,
        branch_query: BRANCH_QUERY,
        nesting_kinds: NESTING_KINDS,
        rules: RULES,
    }
}

fn heuristic() -> HeuristicSpec {
    HeuristicSpec {
        id: "go",
        extensions: EXTENSIONS,
        comment_prefixes: &["//"],
        function_patterns: &[r"^func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)"],
        class_patterns: &[r"^\s*type\s+(?P<name>\w+)\s+(?:struct|interface)\b"],
        import_patterns: &[
            r#"^\s*import\s+(?:[\w.]+\s+)?"(?P<path>[^"]+)""#,
            r#"^\s+(?:[\w.]+\s+)?"(?P<path>[^"]+)"\s*$"#,
        ],
        decision_pattern: r"\b(if|for|case)\b|&&|\|\|",
        nesting_pattern: r"^\s*\}?\s*(?:else\s+)?(if|for|switch|select)\b",
        block_style: BlockStyle::Braces,
        rules: RULES,
    }
}

/// Register the Go strategy and its fallback.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_go::LANGUAGE.into(),
        structural(),
    )?));
    registry.register_fallback(Box::new(HeuristicAnalyzer::new(heuristic())?));
    Ok(())
}
