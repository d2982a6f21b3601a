//! C, C++ and Java analysis (heuristic only).

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::AnalyzerRegistry;

const NESTING: &str = r"^\s*\}?\s*(?:else\s+)?(if|for|while|do|switch|try)\b";

static C_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\bgets\s*\(",
        "gets() has no bounds check: buffer overflow",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\bstrcpy\s*\(",
        "strcpy() has no bounds check; prefer strncpy/strlcpy",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bsprintf\s*\(",
        "sprintf() has no bounds check; prefer snprintf",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bsystem\s*\(",
        "system() runs a shell command",
        Severity::Warning,
        Category::Security,
    ),
];

static JAVA_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"Runtime\.getRuntime\(\)\.exec\s*\(",
        "runs an external command",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r#"\.(executeQuery|executeUpdate|execute)\s*\(\s*"[^"]*"\s*\+"#,
        "SQL built by string concatenation: potential SQL injection",
        Severity::Critical,
        Category::Security,
    )
    .in_strings(),
    PatternRule::new(
        r"\.printStackTrace\(\)",
        "printStackTrace() instead of logging",
        Severity::Info,
        Category::Smell,
    ),
    PatternRule::new(
        r"\bSystem\.(out|err)\.print",
        "console output instead of logging",
        Severity::Info,
        Category::Style,
    ),
];

fn c() -> HeuristicSpec {
    HeuristicSpec {
        id: "c",
        extensions: &["c", "h"],
        comment_prefixes: &["//", "/*", "* ", "*/"],
        function_patterns: &[r"^(?:[\w\*]+[\s\*]+)+(?P<name>\w+)\s*\([^;]*$"],
        class_patterns: &[r"^\s*(?:typedef\s+)?(?:struct|union|enum)\s+(?P<name>\w+)\s*\{?\s*$"],
        import_patterns: &[r#"^\s*#\s*include\s*[<"](?P<path>[^>"]+)[>"]"#],
        decision_pattern: r"\b(if|for|while|case)\b|&&|\|\||\?",
        nesting_pattern: NESTING,
        block_style: BlockStyle::Braces,
        rules: C_RULES,
    }
}

fn cpp() -> HeuristicSpec {
    HeuristicSpec {
        id: "cpp",
        extensions: &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
        comment_prefixes: &["//", "/*", "* ", "*/"],
        function_patterns: &[
            r"^(?:[\w:<>,\*&~]+[\s\*&]+)+(?P<name>[\w:~]+)\s*\([^;]*$",
        ],
        class_patterns: &[
            r"^\s*(?:template\s*<[^>]*>\s*)?(?:class|struct|union|enum(?:\s+class)?)\s+(?P<name>\w+)[^;]*$",
        ],
        import_patterns: &[r#"^\s*#\s*include\s*[<"](?P<path>[^>"]+)[>"]"#],
        decision_pattern: r"\b(if|for|while|case|catch)\b|&&|\|\||\?",
        nesting_pattern: NESTING,
        block_style: BlockStyle::Braces,
        rules: C_RULES,
    }
}

fn java() -> HeuristicSpec {
    HeuristicSpec {
        id: "java",
        extensions: &["java"],
        comment_prefixes: &["//", "/*", "* ", "*/"],
        function_patterns: &[
            r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)*(?:<[^>]+>\s+)?[\w<>\[\],.? ]+\s+(?P<name>\w+)\s*\([^;]*$",
        ],
        class_patterns: &[
            r"^\s*(?:(?:public|private|protected|static|final|abstract|sealed)\s+)*(?:class|interface|enum|record)\s+(?P<name>\w+)",
        ],
        import_patterns: &[r"^\s*import\s+(?:static\s+)?(?P<path>[\w.*]+)\s*;"],
        decision_pattern: r"\b(if|for|while|case|catch)\b|&&|\|\|",
        nesting_pattern: NESTING,
        block_style: BlockStyle::Braces,
        rules: JAVA_RULES,
    }
}

/// Register C, C++ and Java strategies.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    for spec in [c(), cpp(), java()] {
        registry.register(Box::new(HeuristicAnalyzer::new(spec)?));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LanguageAnalyzer, ParsedSource};

    #[test]
    fn test_java_methods_and_imports() {
        let analyzer = HeuristicAnalyzer::new(java()).unwrap();
        let source = "import java.util.List;\nimport static org.junit.Assert.*;\n\npublic class Greeter {\n    public String greet(String name) {\n        if (name == null) {\n            return \"nobody\";\n        }\n        return name;\n    }\n\n    private static List<String> names() {\n        return List.of();\n    }\n}\n";
        let parsed = ParsedSource::plain(source);

        let functions = analyzer.extract_functions(&parsed);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "names"]);
        assert_eq!(functions[0].line, 5);
        assert_eq!(functions[0].end_line, 10);
        assert_eq!(functions[0].complexity, 2);

        assert_eq!(analyzer.extract_classes(&parsed)[0].name, "Greeter");
        assert_eq!(
            analyzer.extract_imports(&parsed),
            vec!["java.util.List", "org.junit.Assert.*"]
        );
    }

    #[test]
    fn test_cpp_qualified_method() {
        let analyzer = HeuristicAnalyzer::new(cpp()).unwrap();
        let source = "#include <vector>\n\nclass Stack {\n};\n\nint Stack::size() const {\n    return 0;\n}\n";
        let parsed = ParsedSource::plain(source);

        let functions = analyzer.extract_functions(&parsed);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "Stack::size");
        assert_eq!(functions[0].end_line, 8);
        assert_eq!(analyzer.extract_classes(&parsed)[0].name, "Stack");
    }

    #[test]
    fn test_c_block_comment_lines_are_not_code() {
        let analyzer = HeuristicAnalyzer::new(c()).unwrap();
        let source = "/*\n * if this were code\n */\nint main(void) {\n    return 0;\n}\n";
        let parsed = ParsedSource::plain(source);
        assert_eq!(analyzer.count_decisions(&parsed), 0);
        assert_eq!(analyzer.extract_functions(&parsed)[0].name, "main");
    }
}
