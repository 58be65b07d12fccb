//! Embedded configuration extraction.
//!
//! Deck and note-type settings live in code blocks on dedicated wiki
//! pages. Both extractors share the same walk (line-offset counter over
//! packs, max-updated tracking over code-block lines) and the same
//! three-way error taxonomy.

pub mod deck;
pub mod note_type;

use pagedeck_types::Line;
use thiserror::Error;

pub use deck::parse_deck;
pub use note_type::parse_note_type;

/// How configuration extraction can fail.
///
/// The three tiers are deliberately distinct: a missing configuration
/// is not a syntax error, and unparseable JSON is not a validation
/// error. Callers substitute defaults for any of them, but report them
/// differently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The page is empty or holds no qualifying code block.
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedded configuration is not parseable as JSON.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The configuration parses but violates a field rule; the message
    /// names the violated field.
    #[error("invalid: {0}")]
    Invalid(String),
}

/// Max `updated` over the `count` lines starting at `start`.
pub(crate) fn fold_updated(updated: i64, lines: &[Line], start: usize, count: usize) -> i64 {
    lines
        .iter()
        .skip(start)
        .take(count)
        .fold(updated, |acc, line| acc.max(line.updated))
}
