//! Regex-based analysis strategy.
//!
//! Used for languages without a tree-sitter grammar and as the fallback when
//! structural parsing fails. Declarations are found line by line; function
//! bodies are delimited by braces, indentation or keyword pairs.

use std::collections::HashSet;

use regex::Regex;

use crate::analysis::{ClassInfo, FunctionInfo, LanguageAnalyzer, ParsedSource};
use crate::detect::{compile_rules, CompiledRule, PatternRule};

/// Names that function patterns can pick up from control-flow lines.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "foreach", "while", "switch", "catch", "return", "match", "do",
    "sizeof", "new",
];

/// How a function body is delimited.
#[derive(Debug, Clone, Copy)]
pub enum BlockStyle {
    /// `{ ... }`
    Braces,
    /// Body is indented deeper than the declaration.
    Indentation,
    /// Opening and closing lines matched by regexes (`def ... end`).
    Keywords {
        open: &'static str,
        close: &'static str,
    },
    /// Declarations have no measurable body.
    None,
}

/// Configuration for a heuristic strategy. Empty patterns are skipped.
#[derive(Debug, Clone)]
pub struct HeuristicSpec {
    pub id: &'static str,
    pub extensions: &'static [&'static str],
    pub comment_prefixes: &'static [&'static str],
    /// Patterns with a `name` group.
    pub function_patterns: &'static [&'static str],
    /// Patterns with a `name` group.
    pub class_patterns: &'static [&'static str],
    /// Patterns with a `path` group.
    pub import_patterns: &'static [&'static str],
    /// Each match is one decision point.
    pub decision_pattern: &'static str,
    /// Lines that open a nested control-flow block.
    pub nesting_pattern: &'static str,
    pub block_style: BlockStyle,
    pub rules: &'static [PatternRule],
}

enum Blocks {
    Braces,
    Indentation,
    Keywords { open: Regex, close: Regex },
    None,
}

/// Heuristic strategy built from a [`HeuristicSpec`].
pub struct HeuristicAnalyzer {
    spec: HeuristicSpec,
    functions: Vec<Regex>,
    classes: Vec<Regex>,
    imports: Vec<Regex>,
    decisions: Option<Regex>,
    nesting: Option<Regex>,
    blocks: Blocks,
    rules: Vec<CompiledRule>,
}

fn compile_all(patterns: &[&str]) -> anyhow::Result<Vec<Regex>> {
    patterns.iter().map(|p| compile_one(p)).collect()
}

fn compile_one(pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow::anyhow!("compiling pattern {:?}: {}", pattern, e))
}

fn compile_optional(pattern: &str) -> anyhow::Result<Option<Regex>> {
    if pattern.is_empty() {
        Ok(None)
    } else {
        compile_one(pattern).map(Some)
    }
}

impl HeuristicAnalyzer {
    pub fn new(spec: HeuristicSpec) -> anyhow::Result<Self> {
        let blocks = match spec.block_style {
            BlockStyle::Braces => Blocks::Braces,
            BlockStyle::Indentation => Blocks::Indentation,
            BlockStyle::Keywords { open, close } => Blocks::Keywords {
                open: compile_one(open)?,
                close: compile_one(close)?,
            },
            BlockStyle::None => Blocks::None,
        };

        Ok(Self {
            functions: compile_all(spec.function_patterns)?,
            classes: compile_all(spec.class_patterns)?,
            imports: compile_all(spec.import_patterns)?,
            decisions: compile_optional(spec.decision_pattern)?,
            nesting: compile_optional(spec.nesting_pattern)?,
            rules: compile_rules(spec.rules)?,
            blocks,
            spec,
        })
    }

    fn is_comment(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.spec
            .comment_prefixes
            .iter()
            .any(|p| trimmed.starts_with(p))
    }

    /// Lines that are code, with their 0-based index.
    fn code_lines<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        text.lines()
            .enumerate()
            .filter(move |(_, l)| !l.trim().is_empty() && !self.is_comment(l))
    }

    fn first_name(patterns: &[Regex], line: &str) -> Option<String> {
        patterns.iter().find_map(|re| {
            re.captures(line)
                .and_then(|caps| caps.name("name"))
                .map(|m| m.as_str().to_string())
        })
    }

    fn decisions_in(&self, lines: &[&str]) -> usize {
        let Some(re) = &self.decisions else {
            return 0;
        };
        lines
            .iter()
            .filter(|l| !self.is_comment(l))
            .map(|l| re.find_iter(l).count())
            .sum()
    }

    fn is_nesting_line(&self, line: &str) -> bool {
        self.nesting.as_ref().is_some_and(|re| re.is_match(line))
    }

    /// Last line index of the body starting at `start`, and its nesting.
    fn measure_body(&self, lines: &[&str], start: usize) -> (usize, u32) {
        match &self.blocks {
            Blocks::Braces => self.measure_braces(lines, start),
            Blocks::Indentation => self.measure_indentation(lines, start),
            Blocks::Keywords { open, close } => self.measure_keywords(lines, start, open, close),
            Blocks::None => (start, 0),
        }
    }

    fn measure_braces(&self, lines: &[&str], start: usize) -> (usize, u32) {
        // Signatures may wrap; give up if no body opens within a few lines
        // or a `;` ends the declaration first.
        let mut depth: i64 = 0;
        let mut opened = false;
        let mut nesting = 0u32;

        for (idx, line) in lines.iter().enumerate().skip(start) {
            if !opened && idx > start + 3 {
                return (start, 0);
            }
            if self.is_comment(line) {
                continue;
            }

            let leading_closers = line.trim_start().chars().take_while(|c| *c == '}').count() as i64;
            if opened && self.is_nesting_line(line) {
                let level = (depth - leading_closers).max(0) as u32;
                nesting = nesting.max(level);
            }

            for ch in line.chars() {
                match ch {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    ';' if !opened && depth == 0 => return (start, 0),
                    _ => {}
                }
            }

            if opened && depth <= 0 {
                return (idx, nesting);
            }
        }

        (lines.len().saturating_sub(1).max(start), nesting)
    }

    fn measure_indentation(&self, lines: &[&str], start: usize) -> (usize, u32) {
        let decl_indent = indent_of(lines[start]);

        // The signature ends at the first line ending with ':'.
        let Some(sig_end) = (start..lines.len())
            .take(8)
            .find(|&i| lines[i].trim_end().ends_with(':'))
        else {
            return (start, 0);
        };

        let mut end = sig_end;
        let mut base = None;
        let mut nesting = 0u32;

        for (idx, line) in lines.iter().enumerate().skip(sig_end + 1) {
            if line.trim().is_empty() {
                continue;
            }
            let indent = indent_of(line);
            if indent <= decl_indent {
                break;
            }
            end = idx;
            let base = *base.get_or_insert(indent);
            if self.is_comment(line) {
                continue;
            }
            if self.is_nesting_line(line) && indent >= base {
                let unit = base.saturating_sub(decl_indent).max(1);
                let level = ((indent - base) / unit + 1) as u32;
                nesting = nesting.max(level);
            }
        }

        (end, nesting)
    }

    fn measure_keywords(
        &self,
        lines: &[&str],
        start: usize,
        open: &Regex,
        close: &Regex,
    ) -> (usize, u32) {
        if !open.is_match(lines[start]) {
            return (start, 0);
        }

        let mut depth: i64 = 0;
        let mut nesting = 0u32;

        for (idx, line) in lines.iter().enumerate().skip(start) {
            if self.is_comment(line) {
                continue;
            }
            if idx > start && self.is_nesting_line(line) {
                nesting = nesting.max(depth.max(0) as u32);
            }
            if open.is_match(line) {
                depth += 1;
            }
            if close.is_match(line) {
                depth -= 1;
            }
            if depth <= 0 {
                return (idx, nesting);
            }
        }

        (lines.len().saturating_sub(1).max(start), nesting)
    }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

impl LanguageAnalyzer for HeuristicAnalyzer {
    fn language_id(&self) -> &'static str {
        self.spec.id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.spec.extensions
    }

    fn comment_prefixes(&self) -> &'static [&'static str] {
        self.spec.comment_prefixes
    }

    fn extract_functions(&self, parsed: &ParsedSource) -> Vec<FunctionInfo> {
        if self.functions.is_empty() {
            return Vec::new();
        }
        let lines: Vec<&str> = parsed.text.lines().collect();

        self.code_lines(parsed.text)
            .filter_map(|(idx, line)| {
                let name = Self::first_name(&self.functions, line)?;
                if CONTROL_KEYWORDS.contains(&name.as_str()) {
                    return None;
                }
                let (end, nesting) = self.measure_body(&lines, idx);
                Some(FunctionInfo {
                    name,
                    line: idx + 1,
                    end_line: end + 1,
                    complexity: 1 + self.decisions_in(&lines[idx..=end]) as u32,
                    nesting,
                })
            })
            .collect()
    }

    fn extract_classes(&self, parsed: &ParsedSource) -> Vec<ClassInfo> {
        if self.classes.is_empty() {
            return Vec::new();
        }
        self.code_lines(parsed.text)
            .filter_map(|(idx, line)| {
                Self::first_name(&self.classes, line).map(|name| ClassInfo {
                    name,
                    line: idx + 1,
                })
            })
            .collect()
    }

    fn extract_imports(&self, parsed: &ParsedSource) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for (_, line) in self.code_lines(parsed.text) {
            for re in &self.imports {
                for caps in re.captures_iter(line) {
                    if let Some(path) = caps.name("path") {
                        let path = path.as_str().trim().to_string();
                        if !path.is_empty() && seen.insert(path.clone()) {
                            found.push(path);
                        }
                    }
                }
            }
        }
        found
    }

    fn count_decisions(&self, parsed: &ParsedSource) -> usize {
        let lines: Vec<&str> = parsed.text.lines().collect();
        self.decisions_in(&lines)
    }

    fn suspicious_patterns(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// The catch-all strategy for unrecognized files: line counts only.
pub fn generic() -> anyhow::Result<HeuristicAnalyzer> {
    HeuristicAnalyzer::new(HeuristicSpec {
        id: crate::analysis::TEXT_LANGUAGE,
        extensions: &[],
        comment_prefixes: &[],
        function_patterns: &[],
        class_patterns: &[],
        import_patterns: &[],
        decision_pattern: "",
        nesting_pattern: "",
        block_style: BlockStyle::None,
        rules: &[],
    })
}
