//! Test fixtures: a minimal line-oriented tokenizer and page builders.
//!
//! The real tokenizer is an external collaborator; this one understands
//! just enough of the wiki text format to drive the pipeline in tests:
//! `code:name` / `table:name` open blocks that swallow deeper-indented
//! rows, `[name.icon]` and `[http…]` brackets, and `#tag` hashtags.

use crate::syntax::{Block, BlockTokenizer, IconPathType, LinkPathType, Node, Pack, PackKind};
use pagedeck_types::{Line, Page};

pub(crate) struct FixtureTokenizer;

impl BlockTokenizer for FixtureTokenizer {
    fn parse_rows(&self, text: &str, has_title: bool) -> Vec<Pack> {
        let rows: Vec<&str> = text.split('\n').collect();
        let mut packs = Vec::new();
        let mut i = 0;

        if has_title && !rows.is_empty() {
            packs.push(Pack {
                kind: PackKind::Title,
                rows: vec![rows[0].to_string()],
            });
            i = 1;
        }

        while i < rows.len() {
            let row = rows[i];
            let indent = leading_spaces(row);
            let content = &row[indent..];
            let kind = if content.starts_with("code:") {
                Some(PackKind::Code)
            } else if content.starts_with("table:") {
                Some(PackKind::Table)
            } else {
                None
            };
            match kind {
                Some(kind) => {
                    let mut block_rows = vec![row.to_string()];
                    let mut j = i + 1;
                    while j < rows.len() && leading_spaces(rows[j]) > indent {
                        block_rows.push(rows[j].to_string());
                        j += 1;
                    }
                    packs.push(Pack {
                        kind,
                        rows: block_rows,
                    });
                    i = j;
                }
                None => {
                    packs.push(Pack {
                        kind: PackKind::Line,
                        rows: vec![row.to_string()],
                    });
                    i += 1;
                }
            }
        }
        packs
    }

    fn convert(&self, pack: &Pack) -> Block {
        let first = pack.rows.first().map(String::as_str).unwrap_or("");
        let indent = leading_spaces(first);
        let content = &first[indent..];
        match pack.kind {
            PackKind::Title => Block::Title {
                text: first.to_string(),
            },
            PackKind::Line => Block::Line {
                indent,
                nodes: parse_inline(content),
            },
            PackKind::Code => Block::Code {
                indent,
                file_name: content.trim_start_matches("code:").to_string(),
                content: body_rows(&pack.rows, indent).join("\n"),
            },
            PackKind::Table => Block::Table {
                indent,
                file_name: content.trim_start_matches("table:").to_string(),
                cells: body_rows(&pack.rows, indent)
                    .iter()
                    .map(|row| row.split('\t').map(parse_inline).collect())
                    .collect(),
            },
        }
    }
}

fn leading_spaces(row: &str) -> usize {
    row.len() - row.trim_start_matches(' ').len()
}

/// Block body rows with the block's one-deeper indent stripped.
fn body_rows(rows: &[String], indent: usize) -> Vec<String> {
    rows[1..]
        .iter()
        .map(|row| row.get(indent + 1..).unwrap_or("").to_string())
        .collect()
}

fn parse_inline(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut plain = String::new();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with('[') {
            if let Some(end) = rest.find(']') {
                if let Some(node) = bracket_node(&rest[1..end]) {
                    flush(&mut plain, &mut nodes);
                    nodes.push(node);
                    i += end + 1;
                    continue;
                }
            }
        }
        if let Some(after) = rest.strip_prefix('#') {
            let tag: String = after.chars().take_while(|c| !c.is_whitespace()).collect();
            if !tag.is_empty() {
                flush(&mut plain, &mut nodes);
                i += 1 + tag.len();
                nodes.push(Node::HashTag { tag });
                continue;
            }
        }
        let ch = rest.chars().next().unwrap();
        plain.push(ch);
        i += ch.len_utf8();
    }
    flush(&mut plain, &mut nodes);
    nodes
}

fn bracket_node(inner: &str) -> Option<Node> {
    if let Some(path) = inner.strip_suffix(".icon") {
        let path_type = if path.starts_with('/') {
            IconPathType::Root
        } else {
            IconPathType::Relative
        };
        return Some(Node::Icon {
            path: path.to_string(),
            path_type,
        });
    }
    if inner.starts_with("http://") || inner.starts_with("https://") {
        return Some(Node::Link {
            path_type: LinkPathType::Absolute,
            href: inner.to_string(),
            content: String::new(),
        });
    }
    None
}

fn flush(plain: &mut String, nodes: &mut Vec<Node>) {
    if !plain.is_empty() {
        nodes.push(Node::Plain {
            text: std::mem::take(plain),
        });
    }
}

/// Lines with deterministic, strictly increasing timestamps.
pub(crate) fn page(rows: &[&str]) -> Vec<Line> {
    rows.iter()
        .enumerate()
        .map(|(i, text)| Line {
            text: text.to_string(),
            id: format!("line{i}"),
            created: 100 + i as i64,
            updated: 200 + i as i64,
        })
        .collect()
}

pub(crate) fn page_with_title(title: &str, rows: &[&str]) -> Page {
    Page {
        title: title.to_string(),
        created: 100,
        updated: 200,
        lines: page(rows),
    }
}
