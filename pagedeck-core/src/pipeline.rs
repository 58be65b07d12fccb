//! End-to-end collection: pages in, packaged notes out.
//!
//! Composes the note assembler with the resolution cache and flattens
//! each note's field map into the ordered field values its note type
//! expects, ready for the external package builder.

use crate::notes::parse_notes;
use crate::render::MediaRef;
use crate::resolve::{PageSource, ResolveError, Resolver};
use pagedeck_types::{Deck, Note, NoteType, Page, PagePath, SOURCE_URL_FIELD};
use std::collections::{HashMap, HashSet};

/// A note with its configuration resolved and fields ordered, as handed
/// to the package builder.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedNote {
    pub guid: String,
    pub id: i64,
    pub updated: i64,
    pub tags: Vec<String>,
    /// Field values in the note type's field order.
    pub fields: Vec<String>,
    pub deck: Deck,
    pub note_type: NoteType,
}

/// Per-page conversion warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWarning {
    pub deck_not_specified: bool,
    pub note_type_not_specified: bool,
    /// Notes dropped because they had no content to study.
    pub skipped: usize,
}

impl PageWarning {
    fn is_trivial(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything one conversion run produces.
#[derive(Debug, Clone, Default)]
pub struct CollectedNotes {
    pub notes: Vec<PackagedNote>,
    /// Media referenced across all pages, deduplicated by URL.
    pub media: Vec<MediaRef>,
    /// Pages with something worth reporting.
    pub warnings: HashMap<PagePath, PageWarning>,
    /// Resolution failures keyed by the failing reference path.
    pub errors: Vec<(PagePath, ResolveError)>,
}

/// Flatten a note's field map into the note type's field order.
///
/// The first field falls back to the unnamed field when it has no named
/// content; any other missing field is empty.
pub fn field_values(note: &Note, note_type: &NoteType) -> Vec<String> {
    note_type
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| match note.fields.get(&field.name) {
            Some(content) => content.clone(),
            None if i == 0 => note.fields.get("").cloned().unwrap_or_default(),
            None => String::new(),
        })
        .collect()
}

/// Convert pages into packaged notes, resolving deck and note-type
/// references through the cache.
pub async fn collect_notes<S: PageSource>(
    resolver: &Resolver<S>,
    project: &str,
    pages: &[Page],
) -> CollectedNotes {
    let mut notes = Vec::new();
    let mut media: Vec<MediaRef> = Vec::new();
    let mut seen_media: HashSet<String> = HashSet::new();
    let mut warnings = HashMap::new();

    for page in pages {
        let parsed = parse_notes(
            resolver.tokenizer(),
            resolver.config(),
            project,
            &page.title,
            &page.lines,
        );

        let mut warning = PageWarning::default();
        for note in parsed.notes {
            if note.deck.is_none() {
                warning.deck_not_specified = true;
            }
            if note.note_type.is_none() {
                warning.note_type_not_specified = true;
            }

            let deck = resolver.resolve_deck(note.deck.as_ref()).await;
            let note_type = resolver.resolve_note_type(note.note_type.as_ref()).await;
            let fields = field_values(&note, &note_type);

            let has_content = note_type
                .fields
                .iter()
                .zip(&fields)
                .any(|(field, value)| field.name != SOURCE_URL_FIELD && !value.is_empty());
            if !has_content {
                warning.skipped += 1;
                tracing::debug!(guid = %note.guid, page = %page.title, "skipping note without content");
                continue;
            }

            notes.push(PackagedNote {
                guid: note.guid,
                id: note.id,
                updated: note.updated,
                tags: note.tags,
                fields,
                deck,
                note_type,
            });
        }
        if !warning.is_trivial() {
            warnings.insert(PagePath::new(project, page.title.clone()), warning);
        }

        for media_ref in parsed.media {
            if seen_media.insert(media_ref.url.clone()) {
                media.push(media_ref);
            }
        }
    }

    tracing::info!(
        notes = notes.len(),
        pages = pages.len(),
        media = media.len(),
        "collected notes"
    );
    CollectedNotes {
        notes,
        media,
        warnings,
        errors: resolver.errors(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::resolve::{default_deck, default_note_type, FetchError};
    use crate::testutil::{page_with_title, FixtureTokenizer};
    use std::sync::Arc;

    struct EmptySource;

    impl PageSource for EmptySource {
        async fn fetch(&self, _path: &PagePath) -> Result<Page, FetchError> {
            Err(FetchError::NotFound)
        }
    }

    fn resolver() -> Resolver<EmptySource> {
        Resolver::new(EmptySource, Arc::new(FixtureTokenizer), Config::default())
    }

    fn note_with_fields(fields: &[(&str, &str)]) -> Note {
        Note {
            guid: "g".into(),
            id: 0,
            updated: 0,
            tags: vec![],
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            deck: None,
            note_type: None,
        }
    }

    #[test]
    fn test_field_values_follow_note_type_order() {
        let note = note_with_fields(&[("Text", "t"), ("Extra", "e")]);
        let mut note_type = default_note_type();
        note_type.fields.insert(1, pagedeck_types::Field::named("Extra"));
        assert_eq!(field_values(&note, &note_type), vec!["t", "e", ""]);
    }

    #[test]
    fn test_first_field_falls_back_to_unnamed() {
        let note = note_with_fields(&[("", "unnamed"), (SOURCE_URL_FIELD, "url")]);
        let values = field_values(&note, &default_note_type());
        assert_eq!(values, vec!["unnamed", "url"]);
    }

    #[tokio::test]
    async fn test_collects_notes_with_default_deck_and_note_type() {
        let pages = vec![page_with_title(
            "Quiz",
            &["Quiz", "code:q1.note", " What is ownership?"],
        )];
        let resolver = resolver();
        let collected = collect_notes(&resolver, "myproject", &pages).await;

        assert_eq!(collected.notes.len(), 1);
        let note = &collected.notes[0];
        assert_eq!(note.deck, default_deck());
        assert_eq!(note.note_type, default_note_type());
        assert_eq!(note.fields[0], "What is ownership?");
        assert!(note.fields[1].starts_with("https://scrapbox.io/myproject/Quiz#"));

        let warning = &collected.warnings[&PagePath::new("myproject", "Quiz")];
        assert!(warning.deck_not_specified);
        assert!(warning.note_type_not_specified);
        assert_eq!(warning.skipped, 0);
    }

    #[tokio::test]
    async fn test_note_without_content_is_skipped() {
        // The note only ever gets its seeded SourceURL field.
        let pages = vec![page_with_title(
            "Quiz",
            &["Quiz", "code:empty.note", " "],
        )];
        let resolver = resolver();
        let collected = collect_notes(&resolver, "myproject", &pages).await;

        assert!(collected.notes.is_empty());
        let warning = &collected.warnings[&PagePath::new("myproject", "Quiz")];
        assert_eq!(warning.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_resolution_is_reported() {
        let pages = vec![page_with_title(
            "Quiz",
            &[
                "Quiz",
                "[deck-Missing.icon]",
                "code:q1.note",
                " content",
            ],
        )];
        let resolver = resolver();
        let collected = collect_notes(&resolver, "myproject", &pages).await;

        assert_eq!(collected.notes.len(), 1);
        assert_eq!(collected.notes[0].deck, default_deck());
        assert_eq!(collected.errors.len(), 1);
        assert_eq!(
            collected.errors[0].0,
            PagePath::new("myproject", "deck-Missing")
        );

        // Deck was referenced, so only the note type is unspecified.
        let warning = &collected.warnings[&PagePath::new("myproject", "Quiz")];
        assert!(!warning.deck_not_specified);
        assert!(warning.note_type_not_specified);
    }

    #[tokio::test]
    async fn test_pages_without_notes_produce_no_warnings() {
        let pages = vec![page_with_title("Empty", &["Empty", "just text"])];
        let resolver = resolver();
        let collected = collect_notes(&resolver, "myproject", &pages).await;
        assert!(collected.notes.is_empty());
        assert!(collected.warnings.is_empty());
        assert!(collected.errors.is_empty());
    }
}
