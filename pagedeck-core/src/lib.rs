//! # pagedeck-core
//!
//! Core library for the pagedeck wiki-to-flashcard converter.
//!
//! The pipeline turns wiki pages (ordered, timestamped lines) into
//! packaged flashcard notes: blocks are walked to assemble notes and
//! pick up deck / note-type references, inline markup is rendered to
//! HTML while hashtags and media references are collected, embedded
//! JSON configuration is extracted and validated, and references are
//! resolved through a per-run single-flight cache.

pub mod config;
pub mod extract;
pub mod notes;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod syntax;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use extract::{parse_deck, parse_note_type, ConfigError};
pub use notes::{detect_note_title, parse_notes, NoteTitle, ParsedNotes};
pub use pipeline::{collect_notes, field_values, CollectedNotes, PackagedNote, PageWarning};
pub use render::{render_blocks, scan_plain_media, MediaRef, RenderOutput};
pub use resolve::{
    default_deck, default_note_type, FetchError, PageSource, ResolveError, Resolver,
};
pub use syntax::{Block, BlockTokenizer, IconPathType, LinkPathType, Node, Pack, PackKind};
