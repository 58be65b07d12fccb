//! Tokenizer boundary: packed rows, blocks, and inline markup nodes.
//!
//! The wiki-markup tokenizer itself is an external collaborator; this
//! module defines the types it produces and the [`BlockTokenizer`]
//! trait the pipeline consumes it through. Blocks do not carry line
//! metadata, so the walker keeps its own line-offset counter and
//! advances it by each pack's row count to slice the original
//! timestamped lines in lock-step.

/// The block kind a pack of rows was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackKind {
    Title,
    Line,
    Table,
    Code,
}

/// A run of consecutive source rows classified as one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Pack {
    pub kind: PackKind,
    pub rows: Vec<String>,
}

impl Pack {
    /// Number of source lines this pack consumes.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// How an icon path is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconPathType {
    /// `/project/title` — carries its own project.
    Root,
    /// A bare title, resolved against the current project.
    Relative,
}

/// How a link target is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPathType {
    /// `/project/title` — an internal link into another project.
    Root,
    /// A bare title — an internal link within the current project.
    Relative,
    /// An external URL.
    Absolute,
}

/// Inline markup node.
///
/// This is a closed set: the renderer matches it exhaustively, so a new
/// node kind is a compile-time-checked addition rather than a fallback
/// branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Plain {
        text: String,
    },
    /// Whitespace-only run, preserved verbatim.
    Blank {
        text: String,
    },
    Quote {
        nodes: Vec<Node>,
    },
    Strong {
        nodes: Vec<Node>,
    },
    Decoration {
        decos: Vec<String>,
        nodes: Vec<Node>,
    },
    Code {
        text: String,
    },
    CommandLine {
        symbol: String,
        text: String,
    },
    Helpfeel {
        text: String,
    },
    Formula {
        formula: String,
    },
    NumberList {
        number: u32,
        nodes: Vec<Node>,
    },
    Image {
        src: String,
    },
    StrongImage {
        src: String,
    },
    Icon {
        path: String,
        path_type: IconPathType,
    },
    StrongIcon {
        path: String,
        path_type: IconPathType,
    },
    Link {
        path_type: LinkPathType,
        href: String,
        content: String,
    },
    HashTag {
        tag: String,
    },
    GoogleMap {
        place: String,
        latitude: f64,
        longitude: f64,
        zoom: u32,
    },
}

/// A converted block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title {
        text: String,
    },
    Line {
        indent: usize,
        nodes: Vec<Node>,
    },
    Table {
        indent: usize,
        file_name: String,
        /// Rows of cells; each cell is a node sequence.
        cells: Vec<Vec<Vec<Node>>>,
    },
    Code {
        indent: usize,
        file_name: String,
        content: String,
    },
}

impl Block {
    pub fn indent(&self) -> usize {
        match self {
            Block::Title { .. } => 0,
            Block::Line { indent, .. }
            | Block::Table { indent, .. }
            | Block::Code { indent, .. } => *indent,
        }
    }

    /// Unwrap a block converted from a [`PackKind::Code`] pack.
    ///
    /// Panics when the tokenizer violates its contract by converting a
    /// code pack into any other block kind. That is a logic error in
    /// the upstream tokenizer, not malformed page content, so it is
    /// propagated rather than recovered from.
    pub fn into_code(self) -> (usize, String, String) {
        match self {
            Block::Code {
                indent,
                file_name,
                content,
            } => (indent, file_name, content),
            other => panic!(
                "tokenizer contract violation: code pack converted to {other:?}"
            ),
        }
    }
}

/// The external wiki-markup tokenizer.
///
/// `parse_rows` splits raw page text into typed packs of rows;
/// `convert` turns a single pack into its block form, including inline
/// node parsing for line and table packs.
pub trait BlockTokenizer {
    fn parse_rows(&self, text: &str, has_title: bool) -> Vec<Pack>;
    fn convert(&self, pack: &Pack) -> Block;
}
