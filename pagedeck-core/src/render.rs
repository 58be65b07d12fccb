//! Inline wiki markup to HTML rendering.
//!
//! Rendering is a pure function over a block list: the HTML string plus
//! the hashtags and media references encountered along the way come
//! back together in a [`RenderOutput`]. Hashtags are not deduplicated
//! here; the caller owns that. Media references replace the original
//! URL inline with a stable, URL-derived file name so the package
//! builder can bundle the files under predictable names.

use crate::config::Config;
use crate::syntax::{Block, IconPathType, LinkPathType, Node};
use pagedeck_types::encode_title_uri;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const INDENT_UNIT: &str = "  ";

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "wav", "m4a", "flac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// An embedded media file referenced by a note field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    /// File name substituted inline for the URL.
    pub file_name: String,
}

/// Result of rendering one field's blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub html: String,
    /// Hashtags in encounter order, duplicates preserved.
    pub tags: Vec<String>,
    pub media: Vec<MediaRef>,
}

/// Render a field's blocks to HTML.
///
/// Nested lines build `<ul>`/`<li>` nesting relative to the minimum
/// indent across all blocks; top-level lines are separated by `<br/>`.
pub fn render_blocks(blocks: &[Block], project: &str, config: &Config) -> RenderOutput {
    let mut renderer = Renderer {
        project,
        origin: config.normalized_origin(),
        tags: Vec::new(),
        media: Vec::new(),
    };
    let html = renderer.blocks(blocks);
    RenderOutput {
        html,
        tags: renderer.tags,
        media: renderer.media,
    }
}

/// Media scan for plain-text (non-markup) fields.
///
/// No markup rendering happens; recognized media URLs are replaced with
/// their derived file names and reported, nothing else changes.
pub fn scan_plain_media(text: &str) -> (String, Vec<MediaRef>) {
    let mut media = Vec::new();
    let replaced = media_url_regex().replace_all(text, |caps: &regex::Captures<'_>| {
        let url = &caps[0];
        let ext = url
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let file_name = media_file_name(url, &ext);
        media.push(MediaRef {
            url: url.to_string(),
            file_name: file_name.clone(),
        });
        file_name
    });
    (replaced.into_owned(), media)
}

enum MediaKind {
    Audio,
    Video,
}

fn media_kind(url: &str) -> Option<(MediaKind, String)> {
    let (_, ext) = url.rsplit_once('.')?;
    if ext.contains('/') {
        return None;
    }
    let ext = ext.to_lowercase();
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some((MediaKind::Audio, ext))
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some((MediaKind::Video, ext))
    } else {
        None
    }
}

/// Stable per-URL file name: a blake3 hash prefix plus the original
/// extension, so the same URL always maps to the same file.
fn media_file_name(url: &str, ext: &str) -> String {
    let hash = blake3::hash(url.as_bytes());
    let hex = hash.to_hex();
    format!("{}.{}", &hex[..16], ext)
}

fn media_url_regex() -> &'static Regex {
    static MEDIA_URL: OnceLock<Regex> = OnceLock::new();
    MEDIA_URL.get_or_init(|| {
        let extensions = AUDIO_EXTENSIONS
            .iter()
            .chain(VIDEO_EXTENSIONS)
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)https?://\S+\.(?:{extensions})\b")).unwrap()
    })
}

fn esc(text: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(text)
}

struct Renderer<'a> {
    project: &'a str,
    origin: String,
    tags: Vec<String>,
    media: Vec<MediaRef>,
}

impl Renderer<'_> {
    fn blocks(&mut self, blocks: &[Block]) -> String {
        let top = blocks.iter().map(Block::indent).min().unwrap_or(0);

        let mut level = 0usize;
        let mut parts: Vec<String> = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            let new_level = block.indent() - top;

            // Close lists on indent decrease, open on increase.
            for l in ((new_level + 1)..=level).rev() {
                parts.push(format!("{}</ul>", INDENT_UNIT.repeat(l - 1)));
            }
            for l in level..new_level {
                parts.push(format!(
                    "{}<ul class=\"level-{}\">",
                    INDENT_UNIT.repeat(l),
                    l + 1
                ));
            }

            let indent = INDENT_UNIT.repeat(new_level);
            match block {
                Block::Title { .. } => {}
                Block::Code {
                    file_name, content, ..
                } => {
                    let rendered = self.code_block(file_name, content);
                    parts.push(if new_level == 0 {
                        rendered
                    } else {
                        wrap_list_item(&rendered, &indent)
                    });
                }
                Block::Table {
                    file_name, cells, ..
                } => {
                    let rendered = self.table(file_name, cells);
                    parts.push(if new_level == 0 {
                        rendered
                    } else {
                        wrap_list_item(&rendered, &indent)
                    });
                }
                Block::Line { nodes, .. } => {
                    let content = self.nodes(nodes);
                    parts.push(if new_level == 0 {
                        let br = if i + 1 == blocks.len() { "" } else { "<br/>" };
                        format!("{content}{br}")
                    } else {
                        format!("{indent}<li>{content}</li>")
                    });
                }
            }

            level = new_level;
        }

        // Flush lists still open at the end.
        for l in (1..=level).rev() {
            parts.push(format!("{}</ul>", INDENT_UNIT.repeat(l - 1)));
        }
        parts.join("\n")
    }

    fn code_block(&self, file_name: &str, content: &str) -> String {
        format!(
            "<figure class=\"codeBlock\">\n{INDENT_UNIT}<figcaption><code>{}</code></figcaption>\n{INDENT_UNIT}<pre><code>{}</code></pre>\n</figure>",
            esc(file_name),
            esc(content)
        )
    }

    fn table(&mut self, file_name: &str, cells: &[Vec<Vec<Node>>]) -> String {
        let rendered: Vec<Vec<String>> = cells
            .iter()
            .map(|row| row.iter().map(|cell| self.nodes(cell)).collect())
            .collect();

        let cell_indent = INDENT_UNIT.repeat(3);
        let head_html = rendered
            .first()
            .map(|row| {
                row.iter()
                    .map(|cell| format!("{cell_indent}<th>{cell}</th>"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        let row_indent = INDENT_UNIT.repeat(2);
        let body_html = rendered
            .iter()
            .skip(1)
            .map(|row| {
                let cells_html = row
                    .iter()
                    .map(|cell| format!("{cell_indent}<td>{cell}</td>"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{row_indent}<tr>\n{cells_html}\n{row_indent}</tr>")
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "<table class=\"table\">\n{INDENT_UNIT}<caption>{}</caption>\n{INDENT_UNIT}<thead>\n{row_indent}<tr>\n{head_html}\n{row_indent}</tr>\n{INDENT_UNIT}</thead>\n{INDENT_UNIT}<tbody>\n{body_html}\n{INDENT_UNIT}</tbody>\n</table>",
            esc(file_name)
        )
    }

    fn nodes(&mut self, nodes: &[Node]) -> String {
        nodes.iter().map(|node| self.node(node)).collect()
    }

    fn node(&mut self, node: &Node) -> String {
        match node {
            Node::Plain { text } => esc(text).into_owned(),
            Node::Blank { text } => text.clone(),
            Node::Quote { nodes } => {
                format!("<span class=\"quote\">{}</span>", self.nodes(nodes))
            }
            Node::Strong { nodes } => format!("<strong>{}</strong>", self.nodes(nodes)),
            Node::Decoration { decos, nodes } => {
                let inner = self.nodes(nodes);
                if decos.is_empty() {
                    inner
                } else {
                    let classes = decos
                        .iter()
                        .map(|deco| format!("deco-{}", esc(deco)))
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("<span class=\"{classes}\">{inner}</span>")
                }
            }
            Node::Code { text } => format!("<code class=\"code\">{}</code>", esc(text)),
            Node::CommandLine { symbol, text } => {
                format!("<code class=\"cli\">{} {}</code>", esc(symbol), esc(text))
            }
            Node::Helpfeel { text } => {
                format!("<code class=\"helpfeel\">? {}</code>", esc(text))
            }
            Node::Formula { formula } => format!("\\( {} \\)", esc(formula)),
            Node::NumberList { number, nodes } => {
                format!("{}. {}", number, self.nodes(nodes))
            }
            Node::Image { src } => image_tag(src),
            Node::StrongImage { src } => format!("<strong>{}</strong>", image_tag(src)),
            Node::Icon { path, path_type } => self.icon(path, *path_type),
            Node::StrongIcon { path, path_type } => {
                format!("<strong>{}</strong>", self.icon(path, *path_type))
            }
            Node::Link {
                path_type,
                href,
                content,
            } => self.link(*path_type, href, content),
            Node::HashTag { tag } => {
                self.tags.push(tag.clone());
                String::new()
            }
            Node::GoogleMap {
                place,
                latitude,
                longitude,
                zoom,
            } => format!(
                "<a class=\"google-map\" href=\"https://www.google.com/maps/search/{place}/@{lat},{lng},{zoom}z\">N{lat},E{lng},Z{zoom} {place}</a>",
                place = esc(place),
                lat = latitude,
                lng = longitude,
                zoom = zoom
            ),
        }
    }

    fn icon(&self, path: &str, path_type: IconPathType) -> String {
        let (href, src, alt) = match path_type {
            IconPathType::Root => (
                format!("{}{}", self.origin, path),
                format!("{}/api/pages{}/icon", self.origin, path),
                strip_project(path).to_string(),
            ),
            IconPathType::Relative => (
                format!("{}/{}/{}", self.origin, self.project, path),
                format!("{}/api/pages/{}/{}/icon", self.origin, self.project, path),
                path.to_string(),
            ),
        };
        format!(
            "<a class=\"icon\" target=\"_blank\" href=\"{}\"><img src=\"{}\" alt=\"{}\" /></a>",
            esc(&href),
            esc(&src),
            esc(&alt)
        )
    }

    fn link(&mut self, path_type: LinkPathType, href: &str, content: &str) -> String {
        match path_type {
            LinkPathType::Root => format!(
                "<a class=\"page-link\" target=\"_blank\" href=\"{}\">{}</a>",
                esc(&format!("{}{}", self.origin, href)),
                esc(href)
            ),
            LinkPathType::Relative => format!(
                "<a class=\"page-link\" target=\"_blank\" href=\"{}\">{}</a>",
                esc(&format!(
                    "{}/{}/{}",
                    self.origin,
                    self.project,
                    encode_title_uri(href)
                )),
                esc(href)
            ),
            LinkPathType::Absolute => {
                if let Some((kind, file_name)) = self.register_media(href) {
                    match kind {
                        MediaKind::Audio => format!(
                            "<audio class=\"audio\" controls src=\"{}\"></audio>",
                            esc(&file_name)
                        ),
                        MediaKind::Video => format!(
                            "<video class=\"video\" controls src=\"{}\"></video>",
                            esc(&file_name)
                        ),
                    }
                } else {
                    let text = if content.is_empty() { href } else { content };
                    format!(
                        "<a class=\"link\" target=\"_blank\" href=\"{}\">{}</a>",
                        esc(href),
                        esc(text)
                    )
                }
            }
        }
    }

    fn register_media(&mut self, url: &str) -> Option<(MediaKind, String)> {
        let (kind, ext) = media_kind(url)?;
        let file_name = media_file_name(url, &ext);
        self.media.push(MediaRef {
            url: url.to_string(),
            file_name: file_name.clone(),
        });
        Some((kind, file_name))
    }
}

fn wrap_list_item(rendered: &str, indent: &str) -> String {
    let body = rendered
        .split('\n')
        .map(|line| format!("{indent}{INDENT_UNIT}{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{indent}<li>\n{body}\n{indent}</li>")
}

fn image_tag(src: &str) -> String {
    format!("<img class=\"image\" src=\"{}\" />", esc(src))
}

fn strip_project(path: &str) -> &str {
    path.strip_prefix('/')
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, title)| title)
        .unwrap_or(path)
}
