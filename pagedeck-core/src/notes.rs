//! Block walking and note assembly.
//!
//! A page's code blocks carry note fields; a file name like
//! `jK99.note.description` routes the block's content into the
//! `description` field of the note with guid `jK99`. Fragments sharing
//! a guid merge into one note, keyed insertion-ordered. Deck and
//! note-type references come from the first matching icons on the page.

use crate::config::Config;
use crate::render::{render_blocks, scan_plain_media, MediaRef};
use crate::syntax::{Block, BlockTokenizer, Node, PackKind};
use pagedeck_types::{
    encode_title_uri, joined_text, title_lc, Line, Note, PagePath, SOURCE_URL_FIELD,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const DECK_ICON_PREFIX: &str = "deck-";
const NOTE_TYPE_ICON_PREFIX: &str = "notetype-";

/// Notes assembled from one page, with the media they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedNotes {
    pub notes: Vec<Note>,
    /// Referenced media, deduplicated by URL.
    pub media: Vec<MediaRef>,
}

/// Field routing extracted from a code block's file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteTitle {
    pub guid: String,
    pub name: String,
    /// Whether the fragment is wiki markup (no `(lang)` suffix).
    pub is_markup: bool,
}

/// Parse a code block file name into `(guid, field name, markup flag)`.
///
/// The name must contain `.note`. A trailing `(lang)` suffix (with no
/// parentheses inside) marks the fragment as plain text and is stripped
/// before matching; the part after `.note.` is the field name,
/// defaulting to the unnamed field.
pub fn detect_note_title(file_name: &str) -> Option<NoteTitle> {
    if !file_name.contains(".note") {
        return None;
    }

    static LANG_SUFFIX: OnceLock<Regex> = OnceLock::new();
    static NOTE_NAME: OnceLock<Regex> = OnceLock::new();
    let lang_suffix =
        LANG_SUFFIX.get_or_init(|| Regex::new(r"^(.+)\(([^()]+)\)$").unwrap());
    let note_name =
        NOTE_NAME.get_or_init(|| Regex::new(r"^(.+?)\.note(?:|\.(.+))$").unwrap());

    let (trimmed, lang) = match lang_suffix.captures(file_name) {
        Some(caps) => (
            caps.get(1).unwrap().as_str(),
            Some(caps.get(2).unwrap().as_str()),
        ),
        None => (file_name, None),
    };
    let caps = note_name.captures(trimmed)?;
    Some(NoteTitle {
        guid: caps.get(1).unwrap().as_str().to_string(),
        name: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
        is_markup: lang.is_none(),
    })
}

struct FieldAcc {
    is_markup: bool,
    content: String,
}

struct NoteAcc {
    guid: String,
    id: i64,
    updated: i64,
    /// Insertion-ordered field accumulators.
    fields: Vec<(String, FieldAcc)>,
}

/// Assemble the notes of one page.
///
/// Returns notes in the order their first code block appears. Rendering
/// happens here too: markup fields go through [`render_blocks`], plain
/// fields through the media scan only. Tags are seeded with the project
/// and page title, extended by hashtags from markup fields, and
/// deduplicated by normalized title keeping the first-seen literal.
pub fn parse_notes<T: BlockTokenizer + ?Sized>(
    tokenizer: &T,
    config: &Config,
    project: &str,
    title: &str,
    lines: &[Line],
) -> ParsedNotes {
    if lines.is_empty() {
        return ParsedNotes::default();
    }
    let packs = tokenizer.parse_rows(&joined_text(lines), true);

    let mut accs: Vec<NoteAcc> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut deck_ref: Option<PagePath> = None;
    let mut note_type_ref: Option<PagePath> = None;
    let origin = config.normalized_origin();

    let mut counter = 0usize;
    for pack in &packs {
        match pack.kind {
            PackKind::Title => counter += pack.row_count(),
            PackKind::Line | PackKind::Table => {
                counter += pack.row_count();
                if deck_ref.is_some() && note_type_ref.is_some() {
                    continue;
                }
                let block = tokenizer.convert(pack);
                for icon in collect_icons(&block) {
                    let lower = icon.to_lowercase();
                    if deck_ref.is_none() && lower.starts_with(DECK_ICON_PREFIX) {
                        deck_ref = Some(PagePath::parse(&icon, project));
                    }
                    if note_type_ref.is_none() && lower.starts_with(NOTE_TYPE_ICON_PREFIX) {
                        note_type_ref = Some(PagePath::parse(&icon, project));
                    }
                }
            }
            PackKind::Code => {
                let start = counter;
                counter += pack.row_count();

                let (_, file_name, content) = tokenizer.convert(pack).into_code();
                let Some(note_title) = detect_note_title(&file_name) else {
                    continue;
                };

                let span = || lines.iter().skip(start).take(pack.row_count());
                let candidate_id = span().map(|line| line.created * 1000).min();
                let candidate_updated = span().map(|line| line.updated * 1000).max();

                let acc_index = *index.entry(note_title.guid.clone()).or_insert_with(|| {
                    let anchor = lines
                        .get(start)
                        .map(|line| line.id.as_str())
                        .unwrap_or_default();
                    let source_url = format!(
                        "{origin}/{project}/{}#{anchor}",
                        encode_title_uri(title)
                    );
                    accs.push(NoteAcc {
                        guid: note_title.guid.clone(),
                        id: i64::MAX,
                        updated: i64::MIN,
                        fields: vec![(
                            SOURCE_URL_FIELD.to_string(),
                            FieldAcc {
                                is_markup: false,
                                content: source_url,
                            },
                        )],
                    });
                    accs.len() - 1
                });

                let acc = &mut accs[acc_index];
                if let Some(id) = candidate_id {
                    acc.id = acc.id.min(id);
                }
                if let Some(updated) = candidate_updated {
                    acc.updated = acc.updated.max(updated);
                }

                let position = match acc
                    .fields
                    .iter()
                    .position(|(name, _)| *name == note_title.name)
                {
                    Some(position) => position,
                    None => {
                        acc.fields.push((
                            note_title.name.clone(),
                            FieldAcc {
                                is_markup: true,
                                content: String::new(),
                            },
                        ));
                        acc.fields.len() - 1
                    }
                };
                let field = &mut acc.fields[position].1;
                field.is_markup &= note_title.is_markup;
                if field.content.is_empty() {
                    field.content = content;
                } else {
                    field.content.push('\n');
                    field.content.push_str(&content);
                }
            }
        }
    }

    let mut media: Vec<MediaRef> = Vec::new();
    let mut seen_media: HashSet<String> = HashSet::new();
    let mut collect_media = |refs: Vec<MediaRef>, media: &mut Vec<MediaRef>| {
        for media_ref in refs {
            if seen_media.insert(media_ref.url.clone()) {
                media.push(media_ref);
            }
        }
    };

    let notes = accs
        .into_iter()
        .map(|acc| {
            let mut tags: Vec<String> = Vec::new();
            let mut dup_check: HashSet<String> = HashSet::new();
            let mut crawl_tag = |tag: &str, tags: &mut Vec<String>| {
                if dup_check.insert(title_lc(tag)) {
                    tags.push(tag.to_string());
                }
            };
            crawl_tag(project, &mut tags);
            crawl_tag(title, &mut tags);

            let mut fields = HashMap::new();
            for (name, field) in acc.fields {
                if !field.is_markup {
                    let (text, refs) = scan_plain_media(&field.content);
                    collect_media(refs, &mut media);
                    fields.insert(name, text);
                    continue;
                }
                let blocks: Vec<Block> = tokenizer
                    .parse_rows(&field.content, false)
                    .iter()
                    .map(|pack| tokenizer.convert(pack))
                    .filter(|block| !matches!(block, Block::Title { .. }))
                    .collect();
                let output = render_blocks(&blocks, project, config);
                for tag in &output.tags {
                    crawl_tag(tag, &mut tags);
                }
                collect_media(output.media, &mut media);
                fields.insert(name, output.html);
            }

            Note {
                guid: acc.guid,
                id: acc.id,
                updated: acc.updated,
                tags,
                fields,
                deck: deck_ref.clone(),
                note_type: note_type_ref.clone(),
            }
        })
        .collect();

    ParsedNotes { notes, media }
}

/// All icon paths in a block, in document order. Icons nest only inside
/// decoration and quote nodes.
fn collect_icons(block: &Block) -> Vec<String> {
    match block {
        Block::Line { nodes, .. } => nodes.iter().flat_map(icons_from_node).collect(),
        Block::Table { cells, .. } => cells
            .iter()
            .flat_map(|row| row.iter())
            .flat_map(|cell| cell.iter().flat_map(icons_from_node))
            .collect(),
        _ => Vec::new(),
    }
}

fn icons_from_node(node: &Node) -> Vec<String> {
    match node {
        Node::Icon { path, .. } | Node::StrongIcon { path, .. } => vec![path.clone()],
        Node::Decoration { nodes, .. } | Node::Quote { nodes } => {
            nodes.iter().flat_map(icons_from_node).collect()
        }
        _ => Vec::new(),
    }
}
