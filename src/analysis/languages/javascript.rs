//! JavaScript, TypeScript and TSX analysis.
//!
//! The three grammars share node names for everything we query except the
//! identifier kind used for class names.

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::treesitter::{StructuralSpec, TreeSitterAnalyzer};
use super::AnalyzerRegistry;

const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];
const TS_EXTENSIONS: &[&str] = &["ts", "mts", "cts"];
const TSX_EXTENSIONS: &[&str] = &["tsx"];

const JS_DECLARATION_QUERY: &str = r#"
(function_declaration name: (identifier) @func_name) @function
(method_definition name: (property_identifier) @func_name) @function
(variable_declarator name: (identifier) @func_name value: (arrow_function)) @function
(class_declaration name: (identifier) @class_name) @class
"#;

const TS_DECLARATION_QUERY: &str = r#"
(function_declaration name: (identifier) @func_name) @function
(method_definition name: (property_identifier) @func_name) @function
(variable_declarator name: (identifier) @func_name value: (arrow_function)) @function
(class_declaration name: (type_identifier) @class_name) @class
(interface_declaration name: (type_identifier) @class_name) @class
"#;

const IMPORT_QUERY: &str = r#"
(import_statement source: (string) @import_path)
(call_expression
  function: (identifier) @_fn
  arguments: (arguments (string) @import_path)
  (#eq? @_fn "require"))
"#;

const BRANCH_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @branch
(for_in_statement) @branch
(while_statement) @branch
(do_statement) @branch
(switch_case) @branch
(catch_clause) @branch
(ternary_expression) @branch
(binary_expression operator: "&&") @branch
(binary_expression operator: "||") @branch
(binary_expression operator: "??") @branch
"#;

const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_statement",
    "try_statement",
];

static RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\beval\s*\(",
        "use of eval(): potential code injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\.innerHTML\s*=[^=]",
        "assignment to innerHTML: potential XSS",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bdocument\.write\s*\(",
        "document.write(): potential XSS",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bnew\s+Function\s*\(",
        "Function constructor evaluates strings as code",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bconsole\.log\s*\(",
        "console.log() left in code",
        Severity::Info,
        Category::Style,
    ),
];

fn structural(
    id: &'static str,
    extensions: &'static [&'static str],
    declaration_query: &'static str,
) -> StructuralSpec {
    StructuralSpec {
        id,
        extensions,
        comment_prefixes: &["//"],
        declaration_query,
        import_query: IMPORT_QUERY,
        branch_query: BRANCH_QUERY,
        nesting_kinds: NESTING_KINDS,
        rules: RULES,
    }
}

fn heuristic(id: &'static str, extensions: &'static [&'static str]) -> HeuristicSpec {
    HeuristicSpec {
        id,
        extensions,
        comment_prefixes: &["//"],
        function_patterns: &[
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>[\w$]+)",
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[\w$]+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[\w$]+)\s*(?::[^=]+)?=>",
            r"^\s+(?:(?:public|private|protected|static|readonly|async|get|set)\s+)*(?P<name>[A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::[^{]+)?\{\s*$",
        ],
        class_patterns: &[
            r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface)\s+(?P<name>[\w$]+)",
        ],
        import_patterns: &[
            r#"^\s*import\s+(?:.*?\s+from\s+)?['"](?P<path>[^'"]+)['"]"#,
            r#"\brequire\(\s*['"](?P<path>[^'"]+)['"]\s*\)"#,
        ],
        decision_pattern: r"\b(if|for|while|case|catch)\b|&&|\|\||\?\?",
        nesting_pattern: r"^\s*\}?\s*(?:else\s+)?(if|for|while|do|switch|try)\b",
        block_style: BlockStyle::Braces,
        rules: RULES,
    }
}

/// Register JavaScript, TypeScript and TSX strategies and their fallbacks.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_javascript::LANGUAGE.into(),
        structural("javascript", JS_EXTENSIONS, JS_DECLARATION_QUERY),
    )?));
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        structural("typescript", TS_EXTENSIONS, TS_DECLARATION_QUERY),
    )?));
    registry.register(Box::new(TreeSitterAnalyzer::new(
        tree_sitter_typescript::LANGUAGE_TSX.into(),
        structural("tsx", TSX_EXTENSIONS, TS_DECLARATION_QUERY),
    )?));

    for (id, extensions) in [
        ("javascript", JS_EXTENSIONS),
        ("typescript", TS_EXTENSIONS),
        ("tsx", TSX_EXTENSIONS),
    ] {
        registry.register_fallback(Box::new(HeuristicAnalyzer::new(heuristic(id, extensions))?));
    }
    Ok(())
}
