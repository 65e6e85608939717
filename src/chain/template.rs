//! Prompt template rendering.
//!
//! Templates use `{identifier}` placeholders resolved from a context map.
//! A placeholder whose key is missing from the context is preserved
//! verbatim — downstream prompts may be logged or tested against the exact
//! rendered text, so this behavior is a contract, not a convenience.
//! Doubled braces escape a literal brace, matching the source templates.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Raised for templates with unbalanced braces. Always recovered by the
/// orchestrator, which falls back to the raw template text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unmatched '{{' at byte offset {0}")]
    UnmatchedOpen(usize),
    #[error("unmatched '}}' at byte offset {0}")]
    UnmatchedClose(usize),
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder pattern")
    })
}

/// Render `template` against `context` with best-effort substitution.
pub fn render(template: &str, context: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in token_pattern().captures_iter(template) {
        let matched = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let gap = &template[last..matched.0];
        check_literal(gap, last)?;
        out.push_str(gap);

        match &template[matched.0..matched.1] {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            token => match caps.get(1).and_then(|name| context.get(name.as_str())) {
                Some(value) => out.push_str(value),
                None => out.push_str(token),
            },
        }
        last = matched.1;
    }

    let tail = &template[last..];
    check_literal(tail, last)?;
    out.push_str(tail);
    Ok(out)
}

/// Literal text between tokens must not contain stray braces.
fn check_literal(text: &str, offset: usize) -> Result<(), TemplateError> {
    if let Some(pos) = text.find('{') {
        return Err(TemplateError::UnmatchedOpen(offset + pos));
    }
    if let Some(pos) = text.find('}') {
        return Err(TemplateError::UnmatchedClose(offset + pos));
    }
    Ok(())
}
