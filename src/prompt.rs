//! Prompt assembly and model routing. Pure functions, no I/O.

use crate::config::Routing;
use crate::memory::{ConversationTurn, Role};

const GENERAL_PROMPT: &str = "You are Sarek, a logical and helpful AI assistant named after Spock's father. Provide clear, technical explanations with Vulcan-like precision.";
const CODE_PROMPT: &str = "You are Sarek, a code analysis expert. Provide detailed technical explanations of code, algorithms, and programming concepts.";
const CREATIVE_PROMPT: &str = "You are Sarek, a creative and analytical assistant. Help with both technical and creative tasks with logical precision.";

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "class",
    "debug",
    "algorithm",
    "programming",
    "syntax",
    "bug",
    "error",
    "compile",
    "refactor",
];
const MATH_KEYWORDS: &[&str] = &["calculate", "math", "equation", "formula", "solve"];
const CREATIVE_KEYWORDS: &[&str] = &["write", "story", "creative", "poem", "narrative"];

/// System prompt for a model; unknown models get the general one.
pub fn system_prompt(model: &str) -> &'static str {
    match model {
        "codellama" => CODE_PROMPT,
        "llama2" => CREATIVE_PROMPT,
        _ => GENERAL_PROMPT,
    }
}

/// Build the full prompt for `query` with `context` turns (oldest first).
pub fn assemble(model: &str, context: &[ConversationTurn], query: &str) -> String {
    let system = system_prompt(model);
    if context.is_empty() {
        return format!("{}\n\nUser: {}\nAssistant:", system, query);
    }

    let mut lines = vec![system.to_string(), "\nPrevious conversation context:".to_string()];
    for turn in context {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        lines.push(format!("{}: {}", speaker, turn.text));
    }

    format!(
        "{}\n\nCurrent question:\nUser: {}\nAssistant:",
        lines.join("\n"),
        query
    )
}

/// Pick a model by keywords in the query. Checked in order: code, math,
/// creative; anything else goes to the general model.
pub fn route_model<'a>(query: &str, routing: &'a Routing) -> &'a str {
    let lower = query.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if mentions(CODE_KEYWORDS) {
        &routing.code
    } else if mentions(MATH_KEYWORDS) {
        &routing.math
    } else if mentions(CREATIVE_KEYWORDS) {
        &routing.creative
    } else {
        &routing.general
    }
}
