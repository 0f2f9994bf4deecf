//! Rich-text segmentation of inline HTML.
//!
//! Inline nodes are walked with the annotation state carried down the
//! recursion. Text is collected as styled pieces, then placeholders are
//! restored, whitespace is collapsed across piece boundaries, equal styles
//! are merged and over-long runs are split.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use sn2n_shared::{
    Annotations, BlockKind, ContentBlock, ConversionConfig, Highlight, ImageSource, RichTextRun,
};

use crate::canonical::normalize_inline;
use crate::classify::{NodeClass, classify, inline_annotations, is_ui_control};
use crate::context::ConvertContext;
use crate::images::UrlImageResolver;
use crate::placeholder::Placeholders;
use crate::preprocess::{content_root, prepare};

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Style {
    annotations: Annotations,
    link: Option<String>,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    style: Style,
    line_break: bool,
}

/// Output of segmenting a run of inline nodes.
#[derive(Debug, Default)]
pub(crate) struct Segmented {
    pub runs: Vec<RichTextRun>,
    /// Image blocks found inline, to be emitted after the paragraph.
    pub images: Vec<ContentBlock>,
}

#[derive(Default)]
struct Collector {
    pieces: Vec<Piece>,
    images: Vec<ContentBlock>,
}

impl Collector {
    fn text(&mut self, text: String, style: &Style) {
        if !text.is_empty() {
            self.pieces.push(Piece {
                text,
                style: style.clone(),
                line_break: false,
            });
        }
    }

    fn line_break(&mut self, style: &Style) {
        self.pieces.push(Piece {
            text: "\n".into(),
            style: style.clone(),
            line_break: true,
        });
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Segment an inline HTML fragment into runs.
///
/// Images are ignored; block-level markup degrades to its text.
pub fn segment_fragment(html: &str, config: &ConversionConfig) -> Vec<RichTextRun> {
    let prepared = prepare(html);
    let doc = prepared.parse();
    let root = content_root(&doc);
    let resolver = UrlImageResolver::default();
    let mut ctx = ConvertContext::new(config, &resolver, &prepared.placeholders);
    segment_nodes(&mut ctx, root.children(), Annotations::plain()).runs
}

/// Segment a sequence of sibling nodes sharing `base` annotations.
pub(crate) fn segment_nodes<'a>(
    ctx: &mut ConvertContext<'_>,
    nodes: impl IntoIterator<Item = NodeRef<'a, Node>>,
    base: Annotations,
) -> Segmented {
    let style = Style {
        annotations: base,
        link: None,
    };
    let mut out = Collector::default();
    for node in nodes {
        walk(ctx, node, &style, &mut out);
    }
    let runs = finish(out.pieces, ctx.placeholders, ctx.config.max_run_length);
    Segmented {
        runs,
        images: out.images,
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

fn walk(ctx: &mut ConvertContext<'_>, node: NodeRef<'_, Node>, style: &Style, out: &mut Collector) {
    match classify(node) {
        NodeClass::Skip => {}
        NodeClass::Text(text) => out.text(normalize_inline(text), style),
        NodeClass::LineBreak => out.line_break(style),
        NodeClass::Image(el) => inline_image(ctx, el, style, out),
        NodeClass::Inline(el) => {
            if let Some(path) = composite_path(el) {
                let annotations = Annotations {
                    bold: true,
                    highlight: Some(Highlight::UiControl),
                    ..style.annotations
                }
                .normalized();
                let path_style = Style {
                    annotations,
                    link: style.link.clone(),
                };
                out.text(path, &path_style);
                return;
            }
            let mut inner = Style {
                annotations: inline_annotations(el, style.annotations),
                link: style.link.clone(),
            };
            if el.value().name() == "a" {
                if let Some(link) = el.value().attr("href").and_then(|h| ctx.resolve_link(h)) {
                    inner.link = Some(link);
                }
            }
            for child in el.children() {
                walk(ctx, child, &inner, out);
            }
        }
        NodeClass::Divider => out.text(" ".into(), style),
        _ => {
            // Block markup inside inline context degrades to its text.
            out.text(" ".into(), style);
            for child in node.children() {
                walk(ctx, child, style, out);
            }
            out.text(" ".into(), style);
        }
    }
}

fn inline_image(ctx: &mut ConvertContext<'_>, el: ElementRef<'_>, style: &Style, out: &mut Collector) {
    let src = image_src(el);
    let resolved = ctx.images.resolve(src, ctx.base_url());

    if ctx.in_cell() {
        let plain = Style {
            annotations: Annotations::plain(),
            link: style.link.clone(),
        };
        match resolved {
            Some(source) => {
                let text = format!(" {} ", ctx.config.cell_image_placeholder);
                out.text(text, &plain);
                ctx.cell_images.push(image_block(source, Vec::new()));
                ctx.stats.cell_images += 1;
                ctx.stats.images += 1;
            }
            None => {
                let text = format!(" {} ", ctx.config.unresolved_image_glyph);
                out.text(text, &plain);
                ctx.stats.unresolved_images += 1;
            }
        }
        return;
    }

    match resolved {
        Some(source) => {
            out.images.push(image_block(source, Vec::new()));
            ctx.stats.images += 1;
        }
        None => {
            warn!(src, "inline image could not be resolved, dropped");
            ctx.stats.unresolved_images += 1;
        }
    }
}

/// `src` of an image element, falling back to lazy-loading attributes.
pub(crate) fn image_src<'a>(el: ElementRef<'a>) -> &'a str {
    el.value()
        .attr("src")
        .or_else(|| el.value().attr("data-src"))
        .unwrap_or("")
}

pub(crate) fn image_block(source: ImageSource, caption: Vec<RichTextRun>) -> ContentBlock {
    ContentBlock::new(BlockKind::Image { source }).with_runs(caption)
}

/// A navigation path built from UI-control spans and separators
/// (`<span class="uicontrol">File</span> &gt; <span class="uicontrol">Save</span>`),
/// rendered as `File > Save`.
fn composite_path(el: ElementRef<'_>) -> Option<String> {
    if is_ui_control(el) {
        return None;
    }
    let mut labels = Vec::new();
    let mut separators = 0;
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if text.chars().all(|c| c == '>' || c == '›' || c.is_whitespace()) {
                    separators += 1;
                } else {
                    return None;
                }
            }
            Node::Element(element) => {
                let child_el = ElementRef::wrap(child)?;
                if is_ui_control(child_el) {
                    let label: String = child_el.text().collect();
                    labels.push(normalize_inline(&label).trim().to_string());
                } else if element.name() == "abbr"
                    || element.classes().any(|c| c.eq_ignore_ascii_case("sep"))
                {
                    separators += 1;
                } else {
                    return None;
                }
            }
            _ => {}
        }
    }
    (labels.len() >= 2 && separators >= 1).then(|| labels.join(" > "))
}

// ---------------------------------------------------------------------------
// Finishing
// ---------------------------------------------------------------------------

fn finish(pieces: Vec<Piece>, placeholders: &Placeholders, max_len: usize) -> Vec<RichTextRun> {
    let mut collapsed: Vec<Piece> = Vec::with_capacity(pieces.len());
    let mut last_was_space = true;

    for piece in pieces {
        if piece.line_break {
            trim_trailing_spaces(&mut collapsed);
            if !collapsed.is_empty() {
                collapsed.push(piece);
            }
            last_was_space = true;
            continue;
        }
        let restored = placeholders.restore_inline(&piece.text);
        let mut text = String::with_capacity(restored.len());
        for c in restored.chars() {
            if c.is_whitespace() {
                if !last_was_space {
                    text.push(' ');
                    last_was_space = true;
                }
            } else {
                text.push(c);
                last_was_space = false;
            }
        }
        if !text.is_empty() {
            collapsed.push(Piece { text, ..piece });
        }
    }
    trim_trailing_spaces(&mut collapsed);

    let mut merged: Vec<Piece> = Vec::with_capacity(collapsed.len());
    for piece in collapsed {
        if let Some(last) = merged.last_mut() {
            if last.style == piece.style {
                last.text.push_str(&piece.text);
                continue;
            }
        }
        merged.push(piece);
    }

    let runs = merged
        .into_iter()
        .map(|piece| {
            let run = RichTextRun::styled(piece.text, piece.style.annotations);
            match piece.style.link {
                Some(link) => run.with_link(link),
                None => run,
            }
        })
        .collect();
    split_runs(runs, max_len)
}

fn trim_trailing_spaces(pieces: &mut Vec<Piece>) {
    while let Some(last) = pieces.last_mut() {
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);
        if last.text.is_empty() {
            pieces.pop();
        } else {
            break;
        }
    }
}

/// Merge adjacent runs with identical styling.
pub(crate) fn merge_runs(runs: Vec<RichTextRun>) -> Vec<RichTextRun> {
    let mut merged: Vec<RichTextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        if let Some(last) = merged.last_mut() {
            if last.same_style(&run) {
                last.text.push_str(&run.text);
                continue;
            }
        }
        merged.push(run);
    }
    merged
}

/// Split every run longer than `max_len` characters, keeping its styling.
pub fn split_runs(runs: Vec<RichTextRun>, max_len: usize) -> Vec<RichTextRun> {
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        if run.char_len() <= max_len {
            out.push(run);
            continue;
        }
        for chunk in split_text(&run.text, max_len) {
            out.push(RichTextRun {
                text: chunk,
                annotations: run.annotations,
                link: run.link.clone(),
            });
        }
    }
    out
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Cuts after the last whitespace that fits, else at the last whole
/// grapheme that fits. Concatenating the chunks gives back `text`.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > max_len {
        let cut = cut_point(rest, max_len);
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn cut_point(s: &str, max_len: usize) -> usize {
    let mut seen = 0;
    let mut last_space_end = None;
    let mut last_grapheme_end = None;
    for (idx, grapheme) in s.grapheme_indices(true) {
        let len = grapheme.chars().count();
        if seen + len > max_len {
            break;
        }
        seen += len;
        let end = idx + grapheme.len();
        last_grapheme_end = Some(end);
        if grapheme.chars().all(char::is_whitespace) {
            last_space_end = Some(end);
        }
    }
    last_space_end.or(last_grapheme_end).unwrap_or_else(|| {
        // A single grapheme longer than the limit: fall back to characters.
        s.char_indices().nth(max_len).map_or(s.len(), |(i, _)| i)
    })
}
