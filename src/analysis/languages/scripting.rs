//! PHP, Ruby, shell and SQL analysis (heuristic only).

use crate::detect::{Category, PatternRule, Severity};

use super::heuristic::{BlockStyle, HeuristicAnalyzer, HeuristicSpec};
use super::AnalyzerRegistry;

static PHP_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\$_GET\s*\[",
        "unvalidated $_GET input",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\$_POST\s*\[",
        "unvalidated $_POST input",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\beval\s*\(",
        "use of eval(): potential code injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\b(exec|shell_exec|passthru)\s*\(",
        "runs a shell command",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\bmysql_query\s*\(",
        "deprecated mysql_query(): use prepared statements",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"(?i)\bmd5\s*\([^)]*pass",
        "md5 used for passwords",
        Severity::Warning,
        Category::Security,
    ),
];

static RUBY_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\beval\s*[\(\s]",
        "use of eval: potential code injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\bsystem\s*\(",
        "runs a shell command",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"\bMarshal\.load\b",
        "Marshal.load on untrusted data",
        Severity::Warning,
        Category::Security,
    ),
];

static BASH_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"\beval\s",
        "use of eval: potential command injection",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\brm\s+-[a-zA-Z]*r[a-zA-Z]*f?\s+\$",
        "recursive delete of a variable path",
        Severity::Critical,
        Category::Security,
    ),
    PatternRule::new(
        r"\b(curl|wget)\b[^|]*\|\s*(ba|z)?sh\b",
        "pipes a download into a shell",
        Severity::Critical,
        Category::Security,
    ),
];

static SQL_RULES: &[PatternRule] = &[
    PatternRule::new(
        r"(?i)\bdrop\s+(table|database)\b",
        "destructive DROP statement",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"(?i)\bgrant\s+all\b",
        "GRANT ALL privileges",
        Severity::Warning,
        Category::Security,
    ),
    PatternRule::new(
        r"(?i)\bselect\s+\*",
        "SELECT * couples queries to the table layout",
        Severity::Info,
        Category::Style,
    ),
];

fn php() -> HeuristicSpec {
    HeuristicSpec {
        id: "php",
        extensions: &["php", "phtml"],
        comment_prefixes: &["//", "#", "/*", "* ", "*/"],
        function_patterns: &[
            r"^\s*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?\s*(?P<name>\w+)",
        ],
        class_patterns: &[
            r"^\s*(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait|enum)\s+(?P<name>\w+)",
        ],
        import_patterns: &[
            r"^\s*use\s+(?P<path>[\w\\]+)",
            r#"\b(?:require|include)(?:_once)?\s*\(?\s*['"](?P<path>[^'"]+)['"]"#,
        ],
        decision_pattern: r"\b(if|elseif|for|foreach|while|case|catch)\b|&&|\|\|",
        nesting_pattern: r"^\s*\}?\s*(?:else\s*)?(if|elseif|for|foreach|while|do|switch|try)\b",
        block_style: BlockStyle::Braces,
        rules: PHP_RULES,
    }
}

fn ruby() -> HeuristicSpec {
    HeuristicSpec {
        id: "ruby",
        extensions: &["rb", "rake"],
        comment_prefixes: &["#"],
        function_patterns: &[r"^\s*def\s+(?:self\.)?(?P<name>[\w?!=]+)"],
        class_patterns: &[r"^\s*(?:class|module)\s+(?P<name>[\w:]+)"],
        import_patterns: &[r#"^\s*require(?:_relative)?\s*\(?\s*['"](?P<path>[^'"]+)['"]"#],
        decision_pattern: r"\b(if|elsif|unless|while|until|for|when|rescue)\b|&&|\|\|",
        nesting_pattern: r"^\s*(if|unless|while|until|for|case|begin)\b|\bdo\s*(?:\|[^|]*\|)?\s*$",
        block_style: BlockStyle::Keywords {
            open: r"^\s*(?:def|class|module|if|unless|while|until|for|case|begin)\b|\bdo\s*(?:\|[^|]*\|)?\s*$",
            close: r"^\s*end\b",
        },
        rules: RUBY_RULES,
    }
}

fn bash() -> HeuristicSpec {
    HeuristicSpec {
        id: "bash",
        extensions: &["sh", "bash", "zsh"],
        comment_prefixes: &["#"],
        function_patterns: &[
            r"^\s*function\s+(?P<name>[\w-]+)",
            r"^\s*(?P<name>[\w-]+)\s*\(\)",
        ],
        class_patterns: &[],
        import_patterns: &[r"^\s*(?:source|\.)\s+(?P<path>[^\s;]+)"],
        decision_pattern: r"\b(if|elif|for|while|until|case)\b|&&|\|\|",
        nesting_pattern: r"^\s*(if|for|while|until|case|select)\b",
        block_style: BlockStyle::Keywords {
            open: r"^\s*(?:if|for|while|until|case|select)\b|\{\s*$",
            close: r"^\s*(?:fi|done|esac)\b|^\s*\}",
        },
        rules: BASH_RULES,
    }
}

fn sql() -> HeuristicSpec {
    HeuristicSpec {
        id: "sql",
        extensions: &["sql"],
        comment_prefixes: &["--"],
        function_patterns: &[
            r"(?i)^\s*create\s+(?:or\s+replace\s+)?(?:function|procedure)\s+(?P<name>[\w.]+)",
        ],
        class_patterns: &[
            r"(?i)^\s*create\s+(?:table|view)\s+(?:if\s+not\s+exists\s+)?(?P<name>[\w.]+)",
        ],
        import_patterns: &[],
        decision_pattern: r"(?i)\b(when|if|while|loop|and|or)\b",
        nesting_pattern: "",
        block_style: BlockStyle::None,
        rules: SQL_RULES,
    }
}

/// Register PHP, Ruby, shell and SQL strategies.
pub fn register(registry: &mut AnalyzerRegistry) -> anyhow::Result<()> {
    for spec in [php(), ruby(), bash(), sql()] {
        registry.register(Box::new(HeuristicAnalyzer::new(spec)?));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LanguageAnalyzer, ParsedSource};

    #[test]
    fn test_bash_functions() {
        let analyzer = HeuristicAnalyzer::new(bash()).unwrap();
        let source = "#!/bin/bash\nsource ./lib.sh\n\ndeploy() {\n  for host in \"$@\"; do\n    if ping -c1 \"$host\"; then\n      echo ok\n    fi\n  done\n}\n";
        let parsed = ParsedSource::plain(source);

        let functions = analyzer.extract_functions(&parsed);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "deploy");
        assert_eq!(functions[0].end_line, 10);
        assert_eq!(functions[0].nesting, 2);
        assert_eq!(analyzer.extract_imports(&parsed), vec!["./lib.sh"]);
    }

    #[test]
    fn test_php_structure() {
        let analyzer = HeuristicAnalyzer::new(php()).unwrap();
        let source = "<?php\nuse App\\Models\\User;\nrequire_once 'config.php';\n\nclass UserController {\n    public function show($id) {\n        return User::find($id);\n    }\n}\n";
        let parsed = ParsedSource::plain(source);

        assert_eq!(analyzer.extract_functions(&parsed)[0].name, "show");
        assert_eq!(analyzer.extract_classes(&parsed)[0].name, "UserController");
        assert_eq!(
            analyzer.extract_imports(&parsed),
            vec!["App\\Models\\User", "config.php"]
        );
    }

    #[test]
    fn test_sql_objects() {
        let analyzer = HeuristicAnalyzer::new(sql()).unwrap();
        let source = "-- schema\nCREATE TABLE IF NOT EXISTS users (id INT);\nCREATE OR REPLACE FUNCTION add_one(x INT) RETURNS INT AS $$ SELECT x + 1 $$;\n";
        let parsed = ParsedSource::plain(source);

        assert_eq!(analyzer.extract_classes(&parsed)[0].name, "users");
        assert_eq!(analyzer.extract_functions(&parsed)[0].name, "add_one");
    }
}
