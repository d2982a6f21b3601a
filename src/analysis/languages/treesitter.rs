//! Tree-sitter backed analysis strategy.
//!
//! A single generic strategy configured per language with queries. Queries
//! are compiled once when the strategy is built.
//!
//! Capture conventions:
//! - declaration query: `@function` + `@func_name`, `@class` + `@class_name`
//! - import query: `@import_path` (surrounding quotes are trimmed)
//! - branch query: one `@branch` capture per decision point

use std::collections::HashSet;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{ClassInfo, FunctionInfo, LanguageAnalyzer, ParsedSource};
use crate::detect::{compile_rules, CompiledRule, PatternRule};

/// Configuration for a tree-sitter language strategy.
#[derive(Clone)]
pub struct StructuralSpec {
    /// Language tag (e.g., "python", "go").
    pub id: &'static str,
    /// File extensions without dot.
    pub extensions: &'static [&'static str],
    pub comment_prefixes: &'static [&'static str],
    /// Query for functions and classes.
    pub declaration_query: &'static str,
    /// Query for import references.
    pub import_query: &'static str,
    /// Query for counting decision points.
    pub branch_query: &'static str,
    /// Node kinds that open a nested control-flow block.
    pub nesting_kinds: &'static [&'static str],
    /// Language-specific suspicious pattern rules.
    pub rules: &'static [PatternRule],
}

/// Tree-sitter based strategy.
pub struct TreeSitterAnalyzer {
    spec: StructuralSpec,
    language: Language,
    declarations: Query,
    imports: Query,
    branches: Query,
    rules: Vec<CompiledRule>,
}

impl TreeSitterAnalyzer {
    /// Build a strategy, compiling its queries and rules.
    pub fn new(language: Language, spec: StructuralSpec) -> anyhow::Result<Self> {
        let compile = |source: &str, what: &str| {
            Query::new(&language, source)
                .map_err(|e| anyhow::anyhow!("invalid {} {} query: {}", spec.id, what, e))
        };
        let declarations = compile(spec.declaration_query, "declaration")?;
        let imports = compile(spec.import_query, "import")?;
        let branches = compile(spec.branch_query, "branch")?;
        let rules = compile_rules(spec.rules)?;

        Ok(Self {
            declarations,
            imports,
            branches,
            rules,
            language,
            spec,
        })
    }

    /// Count branch query matches below a node.
    fn count_branches(&self, node: Node, source: &[u8]) -> usize {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.branches, node, source);
        let mut count = 0;
        while matches.next().is_some() {
            count += 1;
        }
        count
    }

    /// Deepest control-flow nesting below `node`.
    fn max_nesting(&self, node: Node, depth: u32) -> u32 {
        let mut max = depth;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let child_depth = if self.opens_block(child) {
                depth + 1
            } else {
                depth
            };
            max = max.max(self.max_nesting(child, child_depth));
        }
        max
    }

    /// `else if` chains stay at the level of the first `if`.
    fn opens_block(&self, node: Node) -> bool {
        if !self.spec.nesting_kinds.contains(&node.kind()) {
            return false;
        }
        match node.parent() {
            Some(parent) if parent.kind() == "else_clause" => false,
            Some(parent) if parent.kind() == node.kind() => {
                parent.child_by_field_name("alternative") != Some(node)
            }
            _ => true,
        }
    }

    /// Run the declaration query and return `(kind node, name)` pairs for
    /// one capture family.
    fn declared<'t>(
        &self,
        parsed: &ParsedSource,
        root: Node<'t>,
        node_capture: &str,
        name_capture: &str,
    ) -> Vec<(Node<'t>, String)> {
        let source = parsed.text.as_bytes();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.declarations, root, source);
        let names = self.declarations.capture_names();

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        while let Some(m) = matches.next() {
            let mut decl_node = None;
            let mut decl_name = None;
            for capture in m.captures {
                let capture_name = names[capture.index as usize];
                if capture_name == node_capture {
                    decl_node = Some(capture.node);
                } else if capture_name == name_capture {
                    decl_name = Some(parsed.node_text(capture.node));
                }
            }
            if let (Some(node), Some(name)) = (decl_node, decl_name) {
                if !name.is_empty() && seen.insert(node.start_byte()) {
                    found.push((node, name.to_string()));
                }
            }
        }

        found.sort_by_key(|(node, _)| node.start_byte());
        found
    }
}

impl LanguageAnalyzer for TreeSitterAnalyzer {
    fn language_id(&self) -> &'static str {
        self.spec.id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.spec.extensions
    }

    fn comment_prefixes(&self) -> &'static [&'static str] {
        self.spec.comment_prefixes
    }

    fn parse<'a>(&self, text: &'a str) -> anyhow::Result<ParsedSource<'a>> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| anyhow::anyhow!("{} parser produced no tree", self.spec.id))?;

        if tree.root_node().has_error() {
            let line = first_error_line(tree.root_node()).unwrap_or(1);
            anyhow::bail!("{} syntax error near line {}", self.spec.id, line);
        }

        Ok(ParsedSource {
            text,
            tree: Some(tree),
        })
    }

    fn extract_functions(&self, parsed: &ParsedSource) -> Vec<FunctionInfo> {
        let Some(tree) = &parsed.tree else {
            return Vec::new();
        };
        let source = parsed.text.as_bytes();

        self.declared(parsed, tree.root_node(), "function", "func_name")
            .into_iter()
            .map(|(node, name)| FunctionInfo {
                name,
                line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
                complexity: 1 + self.count_branches(node, source) as u32,
                nesting: self.max_nesting(node, 0),
            })
            .collect()
    }

    fn extract_classes(&self, parsed: &ParsedSource) -> Vec<ClassInfo> {
        let Some(tree) = &parsed.tree else {
            return Vec::new();
        };

        self.declared(parsed, tree.root_node(), "class", "class_name")
            .into_iter()
            .map(|(node, name)| ClassInfo {
                name,
                line: node.start_position().row + 1,
            })
            .collect()
    }

    fn extract_imports(&self, parsed: &ParsedSource) -> Vec<String> {
        let Some(tree) = &parsed.tree else {
            return Vec::new();
        };
        let source = parsed.text.as_bytes();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.imports, tree.root_node(), source);
        let names = self.imports.capture_names();

        let mut found = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                if names[capture.index as usize] == "import_path" {
                    let raw = parsed.node_text(capture.node);
                    let path = raw.trim_matches(|c| c == '"' || c == '\'' || c == '`');
                    if !path.is_empty() {
                        found.push((capture.node.start_byte(), path.to_string()));
                    }
                }
            }
        }

        found.sort_by_key(|(start, _)| *start);
        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter_map(|(_, path)| seen.insert(path.clone()).then_some(path))
            .collect()
    }

    fn count_decisions(&self, parsed: &ParsedSource) -> usize {
        match &parsed.tree {
            Some(tree) => self.count_branches(tree.root_node(), parsed.text.as_bytes()),
            None => 0,
        }
    }

    fn suspicious_patterns(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// Line of the first error or missing node, for diagnostics.
fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error_line)
}
