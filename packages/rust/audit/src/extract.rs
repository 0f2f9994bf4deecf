//! Text and element extraction for both sides of the audit.
//!
//! Source text comes from a DOM walk over the prepared page HTML; produced
//! text comes from the block tree. Both sides drop code and technical
//! identifiers and canonicalize what remains, so the character totals are
//! directly comparable.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

use sn2n_blocks::classify::{ListKind, classify_element, inside_table_cell};
use sn2n_blocks::{
    CanonicalOptions, NodeClass, Placeholders, canonicalize, classify, content_root,
    inline_annotations, prepare,
};
use sn2n_shared::{
    Annotations, BlockKind, ContentBlock, ElementCounts, ElementKind, Highlight, RichTextRun,
    TextNode,
};

/// Flattened view of the source page.
#[derive(Debug, Clone, Default)]
pub struct SourceExtract {
    pub segments: Vec<TextNode>,
    pub counts: ElementCounts,
    /// Deepest nesting of lists, callouts and quotes.
    pub max_nesting: usize,
}

/// Flattened view of a produced block tree.
#[derive(Debug, Clone, Default)]
pub struct ProducedExtract {
    pub segments: Vec<TextNode>,
    pub counts: ElementCounts,
    pub block_count: usize,
    /// Deepest block level, table rows excluded.
    pub max_nesting: usize,
}

/// Sum of canonical characters over `segments`.
pub fn total_chars(segments: &[TextNode]) -> usize {
    segments.iter().map(|s| s.text.chars().count()).sum()
}

// ---------------------------------------------------------------------------
// Source side
// ---------------------------------------------------------------------------

/// Extract canonical text segments and element counts from page HTML.
pub fn extract_source(html: &str) -> SourceExtract {
    let prepared = prepare(html);
    let doc = prepared.parse();
    let root = content_root(&doc);

    let mut walker = SourceWalker {
        placeholders: &prepared.placeholders,
        out: SourceExtract::default(),
        buffer: String::new(),
        buffer_path: String::new(),
        path: Vec::new(),
    };
    for child in root.children() {
        walker.walk(child, 0);
    }
    walker.flush();
    walker.out
}

struct SourceWalker<'p> {
    placeholders: &'p Placeholders,
    out: SourceExtract,
    buffer: String,
    buffer_path: String,
    path: Vec<String>,
}

impl SourceWalker<'_> {
    fn walk(&mut self, node: NodeRef<'_, Node>, nesting: usize) {
        match classify(node) {
            NodeClass::Skip => {}
            NodeClass::Text(text) => {
                if self.buffer.is_empty() {
                    self.buffer_path = self.path.join(" > ");
                }
                self.buffer.push_str(text);
            }
            NodeClass::LineBreak => self.buffer.push(' '),
            NodeClass::Image(_) => self.out.counts.increment(ElementKind::Image),
            NodeClass::Inline(el) => {
                if is_technical(el) {
                    // Text is excluded but images still become blocks.
                    self.count_images(el);
                    return;
                }
                for child in el.children() {
                    self.walk(child, nesting);
                }
            }
            NodeClass::Code(el) => {
                self.flush();
                if !inside_table_cell(el) && el.text().any(|t| !t.trim().is_empty()) {
                    self.out.counts.increment(ElementKind::Code);
                }
            }
            NodeClass::Heading(el, _) => {
                if !inside_table_cell(el) && self.has_text(el) {
                    self.out.counts.increment(ElementKind::Heading);
                }
                self.block(el, nesting);
            }
            NodeClass::Table(el) => {
                let has_cells = el
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .any(|d| matches!(d.value().name(), "td" | "th"));
                if has_cells && !inside_table_cell(el) {
                    self.out.counts.increment(ElementKind::Table);
                }
                self.block(el, nesting);
            }
            NodeClass::Callout(el, _) => {
                self.out.counts.increment(ElementKind::Callout);
                self.block(el, nesting + 1);
            }
            NodeClass::List(el, _) | NodeClass::Quote(el) => self.block(el, nesting + 1),
            NodeClass::Container(el) => {
                self.count_container(el);
                self.block(el, nesting);
            }
            NodeClass::DefinitionList(el) | NodeClass::Figure(el) => self.block(el, nesting),
            NodeClass::Divider => self.flush(),
        }
    }

    fn count_images(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match classify(child) {
                NodeClass::Image(_) => self.out.counts.increment(ElementKind::Image),
                NodeClass::Skip => {}
                _ => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.count_images(child);
                    }
                }
            }
        }
    }

    fn count_container(&mut self, el: ElementRef<'_>) {
        if inside_table_cell(el) {
            return;
        }
        match el.value().name() {
            "p" => self.out.counts.increment(ElementKind::Paragraph),
            "li" => {
                let list = el
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|parent| match classify_element(parent) {
                        NodeClass::List(_, ListKind::Numbered) => Some(ElementKind::OrderedList),
                        NodeClass::List(_, ListKind::Bulleted) => Some(ElementKind::UnorderedList),
                        _ => None,
                    });
                if let Some(kind) = list {
                    self.out.counts.increment(kind);
                }
            }
            _ => {}
        }
    }

    fn block(&mut self, el: ElementRef<'_>, nesting: usize) {
        self.flush();
        self.out.max_nesting = self.out.max_nesting.max(nesting);
        self.path.push(path_label(el));
        for child in el.children() {
            self.walk(child, nesting);
        }
        self.flush();
        self.path.pop();
    }

    fn has_text(&self, el: ElementRef<'_>) -> bool {
        let text: String = el.text().collect();
        !canonicalize(&self.placeholders.restore_inline(&text), CanonicalOptions::default())
            .is_empty()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let restored = self.placeholders.restore_inline(&self.buffer);
        self.buffer.clear();
        let text = canonicalize(&restored, CanonicalOptions::default());
        let path = std::mem::take(&mut self.buffer_path);
        if !text.is_empty() {
            self.out.segments.push(TextNode { text, path });
        }
    }
}

/// Code-formatted or technical-identifier markup, excluded from coverage.
fn is_technical(el: ElementRef<'_>) -> bool {
    let ann = inline_annotations(el, Annotations::plain());
    ann.code || ann.highlight == Some(Highlight::Technical)
}

fn path_label(el: ElementRef<'_>) -> String {
    let name = el.value().name();
    match el.value().classes().next() {
        Some(class) => format!("{name}.{class}"),
        None => name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Produced side
// ---------------------------------------------------------------------------

/// Extract canonical text segments and element counts from a block tree.
///
/// Pass the natural (unresolved) tree: blocks filed under deferral markers
/// are not visited.
pub fn extract_produced(blocks: &[ContentBlock]) -> ProducedExtract {
    let mut out = ProducedExtract::default();
    for (index, block) in blocks.iter().enumerate() {
        visit(block, &format!("block[{index}]"), 1, &mut out);
    }
    out
}

fn visit(block: &ContentBlock, path: &str, level: usize, out: &mut ProducedExtract) {
    out.block_count += 1;
    if !matches!(block.kind, BlockKind::TableRow { .. }) {
        out.max_nesting = out.max_nesting.max(level);
    }
    if let Some(kind) = element_kind(&block.kind) {
        out.counts.increment(kind);
    }

    match &block.kind {
        BlockKind::Code { .. } => {}
        BlockKind::TableRow { cells } => {
            for (col, cell) in cells.iter().enumerate() {
                push_segment(out, cell, format!("{path} > cell[{col}]"));
            }
        }
        kind => push_segment(out, &block.runs, format!("{path} > {}", kind.name())),
    }

    for (index, child) in block.children.iter().enumerate() {
        visit(child, &format!("{path} > [{index}]"), level + 1, out);
    }
}

fn push_segment(out: &mut ProducedExtract, runs: &[RichTextRun], path: String) {
    let raw: String = runs
        .iter()
        .filter(|run| !run.is_technical())
        .map(|run| run.text.as_str())
        .collect();
    let text = canonicalize(&raw, CanonicalOptions::default());
    if !text.is_empty() {
        out.segments.push(TextNode { text, path });
    }
}

fn element_kind(kind: &BlockKind) -> Option<ElementKind> {
    match kind {
        BlockKind::Heading { .. } => Some(ElementKind::Heading),
        BlockKind::Code { .. } => Some(ElementKind::Code),
        BlockKind::Table { .. } => Some(ElementKind::Table),
        BlockKind::Image { .. } => Some(ElementKind::Image),
        BlockKind::Callout { .. } => Some(ElementKind::Callout),
        BlockKind::NumberedItem => Some(ElementKind::OrderedList),
        BlockKind::BulletedItem => Some(ElementKind::UnorderedList),
        BlockKind::Paragraph => Some(ElementKind::Paragraph),
        BlockKind::TableRow { .. } | BlockKind::Quote | BlockKind::Divider => None,
    }
}
