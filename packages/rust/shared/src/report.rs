//! Completeness-audit and remediation report types.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TextNode
// ---------------------------------------------------------------------------

/// A flattened, canonicalized span of source or produced text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    /// Canonicalized text.
    pub text: String,
    /// Where the text came from (`body > ul > li` or `block[3] > bulleted_item`).
    pub path: String,
}

// ---------------------------------------------------------------------------
// Element counts
// ---------------------------------------------------------------------------

/// Element categories compared between source HTML and produced blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Heading,
    Code,
    Table,
    Image,
    Callout,
    OrderedList,
    UnorderedList,
    Paragraph,
}

impl ElementKind {
    /// Every element kind, in report order.
    pub const ALL: [ElementKind; 8] = [
        Self::Heading,
        Self::Code,
        Self::Table,
        Self::Image,
        Self::Callout,
        Self::OrderedList,
        Self::UnorderedList,
        Self::Paragraph,
    ];

    /// Kinds whose counts must match exactly unless configured otherwise.
    pub const DEFAULT_CRITICAL: [ElementKind; 5] = [
        Self::Heading,
        Self::Code,
        Self::Table,
        Self::Image,
        Self::Callout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Code => "code",
            Self::Table => "table",
            Self::Image => "image",
            Self::Callout => "callout",
            Self::OrderedList => "ordered_list",
            Self::UnorderedList => "unordered_list",
            Self::Paragraph => "paragraph",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-kind element counts for one side of the comparison.
///
/// List counts are list *items*, so that restructured list boundaries
/// still compare meaningfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCounts {
    pub headings: usize,
    pub code_blocks: usize,
    pub tables: usize,
    pub images: usize,
    pub callouts: usize,
    pub ordered_list_items: usize,
    pub unordered_list_items: usize,
    pub paragraphs: usize,
}

impl ElementCounts {
    pub fn get(&self, kind: ElementKind) -> usize {
        match kind {
            ElementKind::Heading => self.headings,
            ElementKind::Code => self.code_blocks,
            ElementKind::Table => self.tables,
            ElementKind::Image => self.images,
            ElementKind::Callout => self.callouts,
            ElementKind::OrderedList => self.ordered_list_items,
            ElementKind::UnorderedList => self.unordered_list_items,
            ElementKind::Paragraph => self.paragraphs,
        }
    }

    pub fn increment(&mut self, kind: ElementKind) {
        let slot = match kind {
            ElementKind::Heading => &mut self.headings,
            ElementKind::Code => &mut self.code_blocks,
            ElementKind::Table => &mut self.tables,
            ElementKind::Image => &mut self.images,
            ElementKind::Callout => &mut self.callouts,
            ElementKind::OrderedList => &mut self.ordered_list_items,
            ElementKind::UnorderedList => &mut self.unordered_list_items,
            ElementKind::Paragraph => &mut self.paragraphs,
        };
        *slot += 1;
    }
}

/// A count difference between source and produced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountMismatch {
    pub kind: ElementKind,
    pub source: usize,
    pub produced: usize,
    /// Critical mismatches fail the audit on their own.
    pub critical: bool,
}

impl CountMismatch {
    /// Positive when the output has more elements than the source.
    pub fn delta(&self) -> i64 {
        self.produced as i64 - self.source as i64
    }
}

// ---------------------------------------------------------------------------
// AuditReport
// ---------------------------------------------------------------------------

/// Outcome of one completeness audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Produced characters divided by source characters (1.0 == 100%).
    pub coverage: f64,
    pub source_chars: usize,
    pub produced_chars: usize,
    pub source_node_count: usize,
    pub produced_block_count: usize,
    pub source_counts: ElementCounts,
    pub produced_counts: ElementCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<CountMismatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_spans: Vec<TextNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_spans: Vec<TextNode>,
    pub passed: bool,
}

impl AuditReport {
    /// Coverage as a percentage, for display.
    pub fn coverage_percent(&self) -> f64 {
        self.coverage * 100.0
    }

    /// Mismatches that failed the audit.
    pub fn critical_mismatches(&self) -> impl Iterator<Item = &CountMismatch> {
        self.mismatches.iter().filter(|m| m.critical)
    }

    pub fn mismatch(&self, kind: ElementKind) -> Option<&CountMismatch> {
        self.mismatches.iter().find(|m| m.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Urgency of a remediation suggestion. Sorts most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        })
    }
}

/// A human-readable fix suggestion for a failed audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub reason: String,
    pub expected_impact: String,
}
