//! Core domain types: content blocks and rich-text runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Semantic highlight carried by a run. The target renders it as a text colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    /// A UI control label (button, menu entry, field name).
    UiControl,
    /// A technical identifier (table name, property, file path, variable).
    Technical,
}

impl Highlight {
    /// Target colour name for this highlight.
    pub fn color(&self) -> &'static str {
        match self {
            Self::UiControl => "blue",
            Self::Technical => "red",
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Styling applied to a [`RichTextRun`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Highlight>,
}

impl Annotations {
    /// Annotations with every flag off.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Bold only.
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    /// Apply the target's combination rules: code formatting drops bold,
    /// italic and colour.
    pub fn normalized(self) -> Self {
        if self.code {
            Self {
                bold: false,
                italic: false,
                highlight: None,
                ..self
            }
        } else {
            self
        }
    }

    /// Whether no styling is applied at all.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// RichTextRun
// ---------------------------------------------------------------------------

/// A contiguous span of text sharing one annotation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Annotations::is_plain")]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RichTextRun {
    /// An unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, Annotations::plain())
    }

    /// A run with the given annotations (normalized).
    pub fn styled(text: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            text: text.into(),
            annotations: annotations.normalized(),
            link: None,
        }
    }

    /// Attach a link target.
    pub fn with_link(mut self, href: impl Into<String>) -> Self {
        self.link = Some(href.into());
        self
    }

    /// Whether two runs can be merged into one (same styling and link).
    pub fn same_style(&self, other: &RichTextRun) -> bool {
        self.annotations == other.annotations && self.link == other.link
    }

    /// Code-formatted or technical-identifier text. The completeness audit
    /// ignores these runs on the produced side.
    pub fn is_technical(&self) -> bool {
        self.annotations.code || self.annotations.highlight == Some(Highlight::Technical)
    }

    /// Length in Unicode scalar values (the unit of the per-run limit).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Concatenate the text of a run sequence.
pub fn runs_text(runs: &[RichTextRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Block kinds
// ---------------------------------------------------------------------------

/// Visual style of a callout block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalloutStyle {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl CalloutStyle {
    /// Parse a class token (`note`, `warning`, `danger`, ...) into a style.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "note" | "info" | "notice" | "attention" | "remember" | "restriction" => {
                Some(Self::Note)
            }
            "tip" | "hint" | "fastpath" => Some(Self::Tip),
            "important" => Some(Self::Important),
            "warning" | "danger" => Some(Self::Warning),
            "caution" => Some(Self::Caution),
            _ => None,
        }
    }

    /// Icon glyph shown by the target.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Note => "ℹ️",
            Self::Tip => "💡",
            Self::Important => "❗",
            Self::Warning => "⚠️",
            Self::Caution => "🔥",
        }
    }

    /// Background colour name used by the target.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Note => "blue_background",
            Self::Tip => "green_background",
            Self::Important => "purple_background",
            Self::Warning => "red_background",
            Self::Caution => "orange_background",
        }
    }
}

/// Where an image block points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// A publicly reachable URL referenced as-is.
    External { url: String },
    /// A reference returned by an upload collaborator.
    Upload { reference: String },
}

/// The tagged variant of a [`ContentBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading {
        level: u8,
    },
    BulletedItem,
    NumberedItem,
    Table {
        width: usize,
        has_column_header: bool,
        has_row_header: bool,
    },
    TableRow {
        cells: Vec<Vec<RichTextRun>>,
    },
    Callout {
        style: CalloutStyle,
    },
    Code {
        language: String,
    },
    Image {
        source: ImageSource,
    },
    Quote,
    Divider,
}

impl BlockKind {
    /// Short, stable name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Heading { .. } => "heading",
            Self::BulletedItem => "bulleted_item",
            Self::NumberedItem => "numbered_item",
            Self::Table { .. } => "table",
            Self::TableRow { .. } => "table_row",
            Self::Callout { .. } => "callout",
            Self::Code { .. } => "code",
            Self::Image { .. } => "image",
            Self::Quote => "quote",
            Self::Divider => "divider",
        }
    }

    /// Whether the target lets this block carry child blocks.
    pub fn accepts_children(&self) -> bool {
        matches!(
            self,
            Self::Paragraph
                | Self::BulletedItem
                | Self::NumberedItem
                | Self::Table { .. }
                | Self::Callout { .. }
                | Self::Quote
        )
    }
}

// ---------------------------------------------------------------------------
// MarkerId
// ---------------------------------------------------------------------------

/// Opaque identifier linking a parent block to blocks attached after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u32);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker-{:04}", self.0)
    }
}

/// Blocks waiting to be appended after the primary tree is committed,
/// keyed by the marker their parent carries.
pub type DeferredBlocks = BTreeMap<MarkerId, Vec<ContentBlock>>;

// ---------------------------------------------------------------------------
// ContentBlock
// ---------------------------------------------------------------------------

/// The unit of converted output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<RichTextRun>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentBlock>,
    /// Set when the block cannot sit at its natural position and must be
    /// attached by a secondary append.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deferred: bool,
    /// Marker under which this deferred block is filed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_id: Option<MarkerId>,
    /// Markers of deferred blocks that belong under this block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<MarkerId>,
}

impl ContentBlock {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            runs: Vec::new(),
            children: Vec::new(),
            deferred: false,
            marker_id: None,
            markers: Vec::new(),
        }
    }

    pub fn paragraph(runs: Vec<RichTextRun>) -> Self {
        Self::new(BlockKind::Paragraph).with_runs(runs)
    }

    pub fn with_runs(mut self, runs: Vec<RichTextRun>) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_children(mut self, children: Vec<ContentBlock>) -> Self {
        self.children = children;
        self
    }

    /// Concatenated text of this block's own runs (children excluded).
    pub fn plain_text(&self) -> String {
        runs_text(&self.runs)
    }

    /// Number of levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ContentBlock::depth).max().unwrap_or(0)
    }

    /// Visit this block and all descendants in document order.
    /// `level` is 1 for `self`.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ContentBlock, usize)) {
        self.walk_at(1, f);
    }

    fn walk_at<'a>(&'a self, level: usize, f: &mut dyn FnMut(&'a ContentBlock, usize)) {
        f(self, level);
        for child in &self.children {
            child.walk_at(level + 1, f);
        }
    }
}

/// Visit every block of a forest in document order with its level (1-based).
pub fn walk_blocks<'a>(blocks: &'a [ContentBlock], f: &mut dyn FnMut(&'a ContentBlock, usize)) {
    for block in blocks {
        block.walk(f);
    }
}
