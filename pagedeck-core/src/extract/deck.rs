//! Deck configuration extraction.

use super::{fold_updated, ConfigError};
use crate::syntax::{BlockTokenizer, PackKind};
use pagedeck_types::{joined_text, Deck, Line};

const DECK_FILE: &str = "deck.json";

/// Extract a [`Deck`] from a page's lines.
///
/// Every code block whose file name ends with `deck.json` contributes
/// its content; the fragments are concatenated and parsed as one JSON
/// object. The deck's `updated` is the max line-updated over all code
/// blocks on the page.
pub fn parse_deck<T: BlockTokenizer + ?Sized>(
    tokenizer: &T,
    lines: &[Line],
) -> Result<Deck, ConfigError> {
    if lines.is_empty() {
        return Err(ConfigError::NotFound(
            "This is an empty page so no deck is found.".into(),
        ));
    }
    let packs = tokenizer.parse_rows(&joined_text(lines), true);

    let mut json = String::new();
    let mut updated = 0i64;
    let mut counter = 0usize;
    for pack in &packs {
        match pack.kind {
            PackKind::Title | PackKind::Line | PackKind::Table => {
                counter += pack.row_count();
            }
            PackKind::Code => {
                updated = fold_updated(updated, lines, counter, pack.row_count());
                counter += pack.row_count();

                let (_, file_name, content) = tokenizer.convert(pack).into_code();
                if !file_name.ends_with(DECK_FILE) {
                    continue;
                }
                json.push('\n');
                json.push_str(&content);
            }
        }
    }

    if json.trim().is_empty() {
        return Err(ConfigError::NotFound(
            "No deck settings found in the page.".into(),
        ));
    }

    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| ConfigError::Syntax(e.to_string()))?;
    let deck = value
        .as_object()
        .ok_or_else(|| ConfigError::Invalid("Deck setting must be an object.".into()))?;

    let name = match deck.get("name") {
        None => return Err(ConfigError::Invalid("Deck name is not found.".into())),
        Some(value) => value
            .as_str()
            .ok_or_else(|| ConfigError::Invalid("Deck name must be string.".into()))?,
    };
    let id = match deck.get("id") {
        None => return Err(ConfigError::Invalid("Deck id not found.".into())),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| ConfigError::Invalid("Deck id must be number.".into()))?,
    };
    let description = match deck.get("description") {
        None => None,
        Some(value) => Some(
            value
                .as_str()
                .ok_or_else(|| ConfigError::Invalid("Deck description must be string.".into()))?
                .to_string(),
        ),
    };

    Ok(Deck {
        id,
        name: name.to_string(),
        description,
        updated,
    })
}
