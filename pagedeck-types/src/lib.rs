//! Shared types for pagedeck
//!
//! This crate provides the data model used across the pagedeck pipeline:
//! source pages and lines, page paths, assembled notes, and the deck /
//! note-type configuration values extracted from wiki pages.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// A single line of a wiki page, with its edit metadata.
///
/// `created` and `updated` are UNIX timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub id: String,
    pub created: i64,
    pub updated: i64,
}

/// A wiki page: a titled, ordered sequence of timestamped lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub created: i64,
    pub updated: i64,
    pub lines: Vec<Line>,
}

/// Concatenate line texts with newlines, the form consumed by the
/// block tokenizer.
pub fn joined_text(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Name of the reserved field every note carries: a link back to the
/// page the note was extracted from.
pub const SOURCE_URL_FIELD: &str = "SourceURL";

/// Identifies a page within a wiki.
///
/// Two paths are equal when their projects match and their normalized
/// titles (see [`title_lc`]) match, so `PagePath` can key caches and
/// error logs directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePath {
    pub project: String,
    pub title: String,
}

impl PagePath {
    pub fn new(project: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            title: title.into(),
        }
    }

    /// Parse a `/:project/:title` path; anything else is taken as a bare
    /// page title in `default_project`.
    pub fn parse(path: &str, default_project: &str) -> Self {
        if let Some(rest) = path.strip_prefix('/') {
            if let Some((project, title)) = rest.split_once('/') {
                let valid = !project.is_empty()
                    && project
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if valid && !title.is_empty() {
                    return Self::new(project, title);
                }
            }
        }
        Self::new(default_project, path)
    }

    /// Normalized title used for equality and hashing.
    pub fn title_lc(&self) -> String {
        title_lc(&self.title)
    }
}

impl PartialEq for PagePath {
    fn eq(&self, other: &Self) -> bool {
        self.project == other.project && self.title_lc() == other.title_lc()
    }
}

impl Eq for PagePath {}

impl Hash for PagePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.project.hash(state);
        self.title_lc().hash(state);
    }
}

impl std::fmt::Display for PagePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.project, self.title)
    }
}

/// Normalize a page title for identity comparison: lowercase, with
/// spaces folded to underscores.
pub fn title_lc(title: &str) -> String {
    title.replace(' ', "_").to_lowercase()
}

const TITLE_URI: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode a page title for use as a URL path segment.
pub fn encode_title_uri(title: &str) -> String {
    utf8_percent_encode(title, TITLE_URI).to_string()
}

/// An assembled note, not yet tied to concrete deck / note-type values.
///
/// `deck` and `note_type` are references to the pages that carry the
/// corresponding configuration; resolution happens later, through the
/// cache. `id` and `updated` are UNIX timestamps in milliseconds. The
/// unnamed field is stored under the `""` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub guid: String,
    pub id: i64,
    pub updated: i64,
    pub tags: Vec<String>,
    pub fields: HashMap<String, String>,
    pub deck: Option<PagePath>,
    pub note_type: Option<PagePath>,
}

/// A named grouping for generated flashcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub updated: i64,
}

/// One field of a note type's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl Field {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            rtl: None,
            font: None,
            font_size: None,
        }
    }
}

/// A question/answer card template. The HTML carries placeholder syntax
/// consumed by the external package builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub question: String,
    pub answer: String,
}

/// The field schema and rendering templates applied to a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub updated: i64,
    pub fields: Vec<Field>,
    pub templates: Vec<Template>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// LaTeX wrapper, as a (preamble, postamble) pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latex: Option<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cloze: Option<bool>,
}
