//! Output formatting for analysis results and conversation memory.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use std::path::Path;

use colored::*;
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::cache::CacheStats;
use crate::detect::{Issue, Severity};
use crate::memory::{ConversationTurn, MemoryStats, Role, Session};
use crate::project::ProjectReport;

/// Longest turn excerpt shown in listings.
const EXCERPT_CHARS: usize = 160;

/// Single-file analysis as emitted in JSON.
#[derive(Serialize)]
pub struct JsonFileReport<'a> {
    pub version: &'static str,
    pub path: String,
    pub cache_hit: bool,
    #[serde(flatten)]
    pub result: &'a AnalysisResult,
}

/// Print any serializable value as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn write_file_json(path: &Path, result: &AnalysisResult, cache_hit: bool) -> anyhow::Result<()> {
    write_json(&JsonFileReport {
        version: env!("CARGO_PKG_VERSION"),
        path: path.display().to_string(),
        cache_hit,
        result,
    })
}

fn write_header(label: &str, target: &str) {
    println!();
    print!("  ");
    print!("{}", "sarek".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("  {}", format!("{:<10}", label).dimmed());
    println!("{}", target);
    println!();
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "CRIT ".red().bold(),
        Severity::Warning => "WARN ".yellow(),
        Severity::Info => "INFO ".blue(),
    }
}

fn colored_score(score: f64) -> ColoredString {
    let text = format!("{:.2}", score);
    match score {
        s if s <= 5.0 => text.green(),
        s if s <= 10.0 => text.yellow(),
        _ => text.red(),
    }
}

fn write_issue(location: &str, issue: &Issue) {
    print!("    {}", severity_tag(issue.severity));
    print!("  {:<11}", issue.category.as_str().dimmed());
    print!("{}", location.blue());
    if let Some(line) = issue.line {
        print!("{}", format!(":{}", line).dimmed());
    }
    println!();
    println!("            {}", issue.message);
}

/// Pretty output for one analyzed file.
pub fn write_file_pretty(path: &Path, result: &AnalysisResult, cache_hit: bool) {
    let target = path.display().to_string();
    write_header("Analyzing:", &target);

    print!("  {}", "Language: ".dimmed());
    print!("{}", result.language.bold());
    if result.degraded {
        print!("  {}", "(degraded)".yellow());
    }
    if cache_hit {
        print!("  {}", "(cached)".dimmed());
    }
    println!();
    println!(
        "  Lines of code: {}  Complexity: {}",
        result.lines_of_code,
        colored_score(result.complexity_score)
    );
    println!();

    if !result.functions.is_empty() {
        println!("  {} ({}):", "Functions".bold(), result.functions.len());
        for f in &result.functions {
            println!(
                "    {:<32} {}  complexity {:>2}  nesting {}",
                f.name,
                format!("{}-{}", f.line, f.end_line).dimmed(),
                f.complexity,
                f.nesting
            );
        }
        println!();
    }

    if !result.classes.is_empty() {
        println!("  {} ({}):", "Classes".bold(), result.classes.len());
        for c in &result.classes {
            println!("    {:<32} {}", c.name, c.line.to_string().dimmed());
        }
        println!();
    }

    if !result.imports.is_empty() {
        println!("  {} ({}):", "Imports".bold(), result.imports.len());
        println!("    {}", result.imports.join(", "));
        println!();
    }

    if result.issues.is_empty() {
        println!("  {}", "✓ No issues".green());
    } else {
        println!("  {} ({}):", "Issues".bold(), result.issues.len());
        println!();
        for issue in &result.issues {
            write_issue(&target, issue);
        }
    }
    println!();
}

/// Pretty output for a directory report.
pub fn write_project_pretty(report: &ProjectReport, stats: &CacheStats) {
    write_header("Scanning:", &report.root.display().to_string());

    print!(
        "  {} files, {} lines of code",
        report.total_files.to_string().bold(),
        report.total_lines.to_string().bold()
    );
    if report.cancelled {
        print!("  {}", "(cancelled, partial results)".yellow());
    }
    println!();
    println!(
        "  {}",
        format!(
            "cache: {} hits, {} computed, {} evicted",
            report.cache_hits, stats.computations, stats.evictions
        )
        .dimmed()
    );
    println!();

    if !report.languages.is_empty() {
        println!("  {}", "Languages:".bold());
        for (language, s) in &report.languages {
            println!(
                "    {:<12} {:>5} files {:>8} lines {:>6} functions {:>5} classes",
                language, s.files, s.lines, s.functions, s.classes
            );
        }
        println!();
    }

    if !report.most_complex.is_empty() {
        println!("  {}", "Most complex:".bold());
        for f in &report.most_complex {
            println!(
                "    {}  {}",
                colored_score(f.complexity_score),
                f.path.display().to_string().blue()
            );
        }
        println!();
    }

    let total = report.issues.total();
    if total > 0 {
        println!("  {} ({}):", "Issues".bold(), total);
        println!();
        for (_, group) in report.issues.groups() {
            for fi in group {
                write_issue(&fi.path.display().to_string(), &fi.issue);
            }
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("  {} ({}):", "Skipped with errors".red(), report.errors.len());
        for e in &report.errors {
            println!(
                "    {}  {}",
                e.path.display().to_string().blue(),
                format!("{} ({})", e.message, e.kind.as_str()).dimmed()
            );
        }
        println!();
    }

    if !report.skipped.is_empty() {
        println!(
            "  {}",
            format!("{} files skipped by size limit", report.skipped.len()).dimmed()
        );
        println!();
    }
}

/// Collapse whitespace and cut to `max` characters.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Turn listing for history and search results.
pub fn write_turns(turns: &[ConversationTurn], full: bool) {
    if turns.is_empty() {
        println!("  {}", "No matching turns".dimmed());
        return;
    }
    for turn in turns {
        let speaker = match turn.role {
            Role::User => "you".green().bold(),
            Role::Assistant => "sarek".cyan().bold(),
        };
        print!(
            "  {} {} ",
            format!("[{}#{}]", turn.session_id, turn.seq).dimmed(),
            turn.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
        print!("{}", speaker);
        if let Some(model) = &turn.model {
            print!(" {}", format!("({})", model).dimmed());
        }
        println!();
        let body = if full {
            turn.text.clone()
        } else {
            excerpt(&turn.text, EXCERPT_CHARS)
        };
        for line in body.lines() {
            println!("      {}", line);
        }
    }
}

pub fn write_sessions(sessions: &[Session], active: &str) {
    if sessions.is_empty() {
        println!("  {}", "No sessions yet".dimmed());
        return;
    }
    println!("  {}", "Sessions:".bold());
    for s in sessions {
        let marker = if s.id == active { "*".green().bold() } else { " ".normal() };
        println!(
            "  {} {:<24} {:>5} turns  {}",
            marker,
            s.id,
            s.turn_count,
            format!("last active {}", s.last_active.format("%Y-%m-%d %H:%M")).dimmed()
        );
        if let Some(description) = &s.description {
            println!("      {}", description.dimmed());
        }
    }
}

pub fn write_memory_stats(stats: &MemoryStats, cache: Option<&CacheStats>) {
    println!("  {}", "Memory:".bold());
    println!("    turns            {}", stats.turns);
    println!("    sessions         {}", stats.sessions);
    println!("    stored analyses  {}", stats.analyses);
    println!(
        "    database size    {:.2} MB",
        stats.database_bytes as f64 / (1024.0 * 1024.0)
    );
    if let Some(cache) = cache {
        println!("  {}", "Analysis cache (this run):".bold());
        println!("    entries          {}", cache.entries);
        println!("    hits             {}", cache.hits);
        println!("    misses           {}", cache.misses);
        println!("    computations     {}", cache.computations);
        println!("    evictions        {}", cache.evictions);
    }
}
