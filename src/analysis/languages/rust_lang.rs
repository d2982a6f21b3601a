//! Rust analysis.

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::treesitter::{StructuralSpec, TreeSitterAnalyzer};
use super::AnalyzerRegistry;

const EXTENSIONS: &[&str] = &["rs"];

/// Functions and methods share `function_item`. Structs, enums, unions and
/// traits count as classes.
const DECLARATION_QUERY: &str = r#"
(function_item name: (identifier) @func_name) @function
(struct_item name: (type_identifier) @class_name) @class
(enum_item name: (type_identifier) @class_name) @class
(union_item name: (type_identifier) @class_name) @class
(trait_item name: (type_identifier) @class_name) @class
"#;

const IMPORT_QUERY: &str = r#"
(use_declaration argument: (_) @import_path)
(extern_crate_declaration name: (identifier) @import_path)
"#;

const BRANCH_QUERY: &str = r#"
(if_expression) @branch
(for_expression) @branch
(while_expression) @branch
(loop_expression) @branch
(match_arm) @branch
(binary_expression operator: "&&") @branch
(binary_expression operator: "||") @branch
"#;

const NESTING_KINDS: &[&str] = &[
    "if_expression",
    "for_expression",
    "while_expression",
    "loop_expression",
    "match_expression",
];

static RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\bunsafe\s*\{",
        "unsafe block",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\.unwrap\(\)",
        "unwrap() can panic; consider propagating the error",
        Severity::Info,
        Category::Smell,
    ),
    PatternRule::new(
        r"\b(todo|unimplemented)!\s*\(",
        "unimplemented code path",
        Severity::Warning,
        Category::Smell,
    ),
];

fn structural() -> StructuralSpec {
    StructuralSpec {
        id: "rust",
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
        id: "rust",
        extensions: EXTENSIONS,
        comment_prefixes: &["//"],
        function_patterns: &[
            r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+(?P<name>\w+)"#,
        ],
        class_patterns: &[
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|union|trait)\s+(?P<name>\w+)",
        ],
        import_patterns: &[
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?P<path>[^;]+);",
            r"^\s*extern\s+crate\s+(?P<path>\w+)",
        ],
        decision_pattern: r"\b(if|for|while|loop)\b|=>|&&|\|\|",
        nesting_pattern: r"^\s*\}?\s*(?:else\s+)?(if|for|while|loop|match)\b",
        block_style: BlockStyle::Braces,
        rules: RULES,
    }
}

/// Register the Rust strategy and its fallback.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_rust::LANGUAGE.into(),
        structural(),
    )?));
    registry.register_fallback(Box::new(HeuristicAnalyzer::new(heuristic())?));
    Ok(())
}
