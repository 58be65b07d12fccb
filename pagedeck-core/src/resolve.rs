//! Deck and note-type resolution with a single-flight cache.
//!
//! Many notes across many pages can reference the same deck or
//! note-type page; each referenced page must be fetched and parsed
//! exactly once per run. The cache keys on the normalized page path and
//! holds one `OnceCell` per key, so concurrent requesters share the
//! first caller's in-flight fetch+parse instead of starting their own.
//! Entries are never evicted: a reference page is assumed not to change
//! mid-run, and the resolver itself is created per run and dropped at
//! run end.

use crate::config::Config;
use crate::extract::{parse_deck, parse_note_type, ConfigError};
use crate::syntax::BlockTokenizer;
use dashmap::DashMap;
use pagedeck_types::{Deck, Field, NoteType, Page, PagePath, Template, SOURCE_URL_FIELD};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Failure fetching a page from the wiki.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("page not found")]
    NotFound,
    #[error("not permitted to read the page")]
    Forbidden,
    #[error("network error: {0}")]
    Network(String),
}

/// Why a deck or note-type reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The external page-fetch collaborator.
pub trait PageSource: Send + Sync {
    fn fetch(
        &self,
        path: &PagePath,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// The deck substituted when no reference is given or resolution fails.
pub fn default_deck() -> Deck {
    Deck {
        id: 1,
        name: "default".into(),
        description: None,
        updated: 0,
    }
}

/// The note type substituted when no reference is given or resolution
/// fails: a basic cloze type over a text field plus the source URL.
pub fn default_note_type() -> NoteType {
    NoteType {
        id: 1_677_417_085_373,
        name: "Basic (Cloze)".into(),
        updated: 0,
        fields: vec![
            Field {
                name: "Text".into(),
                description: Some("The note text".into()),
                rtl: None,
                font: None,
                font_size: None,
            },
            Field {
                name: SOURCE_URL_FIELD.into(),
                description: Some("URL of the page the note was extracted from".into()),
                rtl: None,
                font: None,
                font_size: None,
            },
        ],
        templates: vec![Template {
            name: "Card 1".into(),
            question: "{{cloze:Text}}\n{{type:Text}}".into(),
            answer: "{{cloze:Text}}<br><a href=\"{{SourceURL}}\">source</a>".into(),
        }],
        css: None,
        latex: None,
        is_cloze: Some(true),
    }
}

type Cell<T> = Arc<OnceCell<Result<T, ResolveError>>>;

/// Per-run resolution cache.
///
/// Failures never escape: they are logged, recorded per path, and the
/// caller gets the default value instead.
pub struct Resolver<S> {
    source: S,
    tokenizer: Arc<dyn BlockTokenizer + Send + Sync>,
    config: Config,
    default_deck: Deck,
    default_note_type: NoteType,
    decks: DashMap<PagePath, Cell<Deck>>,
    note_types: DashMap<PagePath, Cell<NoteType>>,
    errors: DashMap<PagePath, ResolveError>,
}

impl<S: PageSource> Resolver<S> {
    pub fn new(
        source: S,
        tokenizer: Arc<dyn BlockTokenizer + Send + Sync>,
        config: Config,
    ) -> Self {
        Self {
            source,
            tokenizer,
            config,
            default_deck: default_deck(),
            default_note_type: default_note_type(),
            decks: DashMap::new(),
            note_types: DashMap::new(),
            errors: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokenizer(&self) -> &(dyn BlockTokenizer + Send + Sync) {
        self.tokenizer.as_ref()
    }

    /// Resolve a deck reference, or the default deck for `None`.
    pub async fn resolve_deck(&self, path: Option<&PagePath>) -> Deck {
        let Some(path) = path else {
            return self.default_deck.clone();
        };
        let cell = self.decks.entry(path.clone()).or_default().clone();
        let result = cell
            .get_or_init(|| async {
                let outcome = self.fetch_deck(path).await;
                if let Err(error) = &outcome {
                    tracing::warn!(path = %path, %error, "deck resolution failed, substituting the default deck");
                    self.errors.insert(path.clone(), error.clone());
                }
                outcome
            })
            .await;
        match result {
            Ok(deck) => deck.clone(),
            Err(_) => self.default_deck.clone(),
        }
    }

    /// Resolve a note-type reference, or the default note type for `None`.
    pub async fn resolve_note_type(&self, path: Option<&PagePath>) -> NoteType {
        let Some(path) = path else {
            return self.default_note_type.clone();
        };
        let cell = self.note_types.entry(path.clone()).or_default().clone();
        let result = cell
            .get_or_init(|| async {
                let outcome = self.fetch_note_type(path).await;
                if let Err(error) = &outcome {
                    tracing::warn!(path = %path, %error, "note type resolution failed, substituting the default note type");
                    self.errors.insert(path.clone(), error.clone());
                }
                outcome
            })
            .await;
        match result {
            Ok(note_type) => note_type.clone(),
            Err(_) => self.default_note_type.clone(),
        }
    }

    /// Resolution failures recorded so far, keyed by the failing
    /// reference path.
    pub fn errors(&self) -> Vec<(PagePath, ResolveError)> {
        self.errors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    async fn fetch_deck(&self, path: &PagePath) -> Result<Deck, ResolveError> {
        let page = self.source.fetch(path).await?;
        Ok(parse_deck(self.tokenizer.as_ref(), &page.lines)?)
    }

    async fn fetch_note_type(&self, path: &PagePath) -> Result<NoteType, ResolveError> {
        let page = self.source.fetch(path).await?;
        Ok(parse_note_type(self.tokenizer.as_ref(), &page.lines)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{page_with_title, FixtureTokenizer};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory page source counting fetches.
    struct MapSource {
        pages: HashMap<PagePath, Page>,
        fetches: AtomicUsize,
    }

    impl MapSource {
        fn new(pages: Vec<Page>) -> Self {
            let pages = pages
                .into_iter()
                .map(|page| (PagePath::new("myproject", page.title.clone()), page))
                .collect();
            Self {
                pages,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl PageSource for MapSource {
        async fn fetch(&self, path: &PagePath) -> Result<Page, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.pages.get(path).cloned().ok_or(FetchError::NotFound)
        }
    }

    fn deck_page() -> Page {
        page_with_title(
            "deck-English",
            &[
                "deck-English",
                "code:deck.json",
                " {\"id\": 42, \"name\": \"English\"}",
            ],
        )
    }

    fn resolver(pages: Vec<Page>) -> Resolver<MapSource> {
        Resolver::new(
            MapSource::new(pages),
            Arc::new(FixtureTokenizer),
            Config::default(),
        )
    }

    #[tokio::test]
    async fn test_absent_path_resolves_to_default() {
        let resolver = resolver(vec![]);
        let deck = resolver.resolve_deck(None).await;
        assert_eq!(deck, default_deck());
        assert_eq!(resolver.source.fetch_count(), 0);

        let note_type = resolver.resolve_note_type(None).await;
        assert_eq!(note_type, default_note_type());
    }

    #[tokio::test]
    async fn test_resolves_deck_from_page() {
        let resolver = resolver(vec![deck_page()]);
        let path = PagePath::new("myproject", "deck-English");
        let deck = resolver.resolve_deck(Some(&path)).await;
        assert_eq!(deck.id, 42);
        assert_eq!(deck.name, "English");
        assert!(resolver.errors().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_resolution_fetches_once() {
        let resolver = resolver(vec![deck_page()]);
        let path = PagePath::new("myproject", "deck-English");
        resolver.resolve_deck(Some(&path)).await;
        resolver.resolve_deck(Some(&path)).await;
        assert_eq!(resolver.source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_normalized_paths_share_an_entry() {
        let resolver = resolver(vec![deck_page()]);
        resolver
            .resolve_deck(Some(&PagePath::new("myproject", "deck-English")))
            .await;
        resolver
            .resolve_deck(Some(&PagePath::new("myproject", "DECK-ENGLISH")))
            .await;
        assert_eq!(resolver.source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_is_single_flight() {
        let resolver = resolver(vec![deck_page()]);
        let path = PagePath::new("myproject", "deck-English");
        let (a, b) = tokio::join!(
            resolver.resolve_deck(Some(&path)),
            resolver.resolve_deck(Some(&path)),
        );
        assert_eq!(a, b);
        assert_eq!(resolver.source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_substitutes_default_and_records_error() {
        let resolver = resolver(vec![]);
        let path = PagePath::new("myproject", "deck-Missing");
        let deck = resolver.resolve_deck(Some(&path)).await;
        assert_eq!(deck, default_deck());

        let errors = resolver.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, path);
        assert_eq!(
            errors[0].1,
            ResolveError::Fetch(FetchError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_parse_failure_substitutes_default() {
        let broken = page_with_title(
            "deck-Broken",
            &["deck-Broken", "code:deck.json", " not json"],
        );
        let resolver = resolver(vec![broken]);
        let path = PagePath::new("myproject", "deck-Broken");
        let deck = resolver.resolve_deck(Some(&path)).await;
        assert_eq!(deck, default_deck());
        assert!(matches!(
            resolver.errors()[0].1,
            ResolveError::Config(ConfigError::Syntax(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_recorded_once_for_repeated_requests() {
        let resolver = resolver(vec![]);
        let path = PagePath::new("myproject", "deck-Missing");
        resolver.resolve_deck(Some(&path)).await;
        resolver.resolve_deck(Some(&path)).await;
        assert_eq!(resolver.errors().len(), 1);
        assert_eq!(resolver.source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_deck_and_note_type_caches_are_separate() {
        let resolver = resolver(vec![deck_page()]);
        let path = PagePath::new("myproject", "deck-English");
        resolver.resolve_deck(Some(&path)).await;
        // Resolving the same page as a note type is its own fetch, and
        // fails (no note type settings there).
        let note_type = resolver.resolve_note_type(Some(&path)).await;
        assert_eq!(note_type, default_note_type());
        assert_eq!(resolver.source.fetch_count(), 2);
    }
}
