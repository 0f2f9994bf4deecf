//! The block converter: one top-to-bottom walk from page HTML to blocks.
//!
//! Every container is processed with the same TEXT/BLOCK split: inline
//! children accumulate in a pending buffer that is flushed as a paragraph
//! whenever a block-level child appears, so prose interleaved with lists,
//! tables and figures keeps its position.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};
use tracing::{debug, instrument, warn};

use sn2n_shared::{
    Annotations, BlockKind, ContentBlock, ConversionConfig, Result, RichTextRun,
};

use crate::classify::{ListKind, NodeClass, classify, is_chrome};
use crate::context::{ConversionStats, ConvertContext};
use crate::images::ImageResolver;
use crate::preprocess::{content_root, prepare};
use crate::segment::{image_block, image_src, segment_nodes, split_runs, split_text};
use crate::table;

/// Result of converting one page.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub blocks: Vec<ContentBlock>,
    pub stats: ConversionStats,
}

/// Convert page HTML into a block tree.
///
/// Content problems never fail the conversion; unknown markup degrades to
/// its text. The only error is an invalid `config`.
#[instrument(skip_all, fields(html_len = html.len(), max_depth = config.max_depth))]
pub fn convert(
    html: &str,
    config: &ConversionConfig,
    images: &dyn ImageResolver,
) -> Result<Conversion> {
    config.validate()?;

    let prepared = prepare(html);
    let doc = prepared.parse();
    let root = content_root(&doc);

    let mut ctx = ConvertContext::new(config, images, &prepared.placeholders);
    ctx.stats.protected_tokens = prepared.placeholders.len();
    ctx.stats.menu_cascades = prepared.menu_cascades;

    let blocks = convert_children(&mut ctx, root, 1);
    let mut stats = ctx.stats;
    stats.blocks = blocks.len();

    debug!(
        blocks = stats.blocks,
        images = stats.images,
        unresolved_images = stats.unresolved_images,
        cell_images = stats.cell_images,
        deferred_hints = stats.deferred_hints,
        protected_tokens = stats.protected_tokens,
        "conversion complete"
    );

    Ok(Conversion { blocks, stats })
}

/// Whether a block of `kind` at `level` (top level is 1) cannot be written
/// in one request under `max_depth`. A table also needs room for its rows;
/// rows themselves move with their table.
pub fn exceeds_depth(kind: &BlockKind, level: usize, max_depth: usize) -> bool {
    match kind {
        BlockKind::TableRow { .. } => false,
        BlockKind::Table { .. } => level + 1 > max_depth,
        _ => level > max_depth,
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Convert the children of `parent`, which sit at `level`.
pub(crate) fn convert_children(
    ctx: &mut ConvertContext<'_>,
    parent: ElementRef<'_>,
    level: usize,
) -> Vec<ContentBlock> {
    let mut out = Vec::new();
    let mut pending = Vec::new();
    for child in parent.children() {
        let class = classify(child);
        if class.is_inline() {
            pending.push(child);
        } else if !matches!(class, NodeClass::Skip) {
            flush_inline(ctx, &mut pending, &mut out);
            convert_block(ctx, class, level, &mut out);
        }
    }
    flush_inline(ctx, &mut pending, &mut out);
    out
}

fn flush_inline<'a>(
    ctx: &mut ConvertContext<'_>,
    pending: &mut Vec<NodeRef<'a, Node>>,
    out: &mut Vec<ContentBlock>,
) {
    if pending.is_empty() {
        return;
    }
    let segmented = segment_nodes(ctx, pending.drain(..), Annotations::plain());
    if !segmented.runs.is_empty() {
        out.push(ContentBlock::paragraph(segmented.runs));
    }
    out.extend(segmented.images);
}

fn convert_block(
    ctx: &mut ConvertContext<'_>,
    class: NodeClass<'_>,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    match class {
        NodeClass::Container(el) => out.extend(convert_children(ctx, el, level)),
        NodeClass::Heading(el, heading_level) => {
            let segmented = segment_nodes(ctx, el.children(), Annotations::plain());
            if !segmented.runs.is_empty() {
                out.push(
                    ContentBlock::new(BlockKind::Heading {
                        level: heading_level,
                    })
                    .with_runs(segmented.runs),
                );
            }
            out.extend(segmented.images);
        }
        NodeClass::List(el, kind) => convert_list(ctx, el, kind, level, out),
        NodeClass::DefinitionList(el) => convert_definition_list(ctx, el, level, out),
        NodeClass::Table(el) => table::convert_table(ctx, el, level, out),
        NodeClass::Figure(el) => convert_figure(ctx, el, level, out),
        NodeClass::Code(el) => convert_code(ctx, el, out),
        NodeClass::Callout(el, style) => {
            out.push(lead_block(ctx, el, BlockKind::Callout { style }, level));
        }
        NodeClass::Quote(el) => {
            let quote = lead_block(ctx, el, BlockKind::Quote, level);
            if !is_empty(&quote) {
                out.push(quote);
            }
        }
        NodeClass::Divider => out.push(ContentBlock::new(BlockKind::Divider)),
        NodeClass::Text(_)
        | NodeClass::Inline(_)
        | NodeClass::LineBreak
        | NodeClass::Image(_)
        | NodeClass::Skip => {}
    }
}

/// Build a block whose own text is the leading paragraph of `el` and whose
/// children are everything after it (list items, callouts, quotes).
fn lead_block(
    ctx: &mut ConvertContext<'_>,
    el: ElementRef<'_>,
    kind: BlockKind,
    level: usize,
) -> ContentBlock {
    let mut children = convert_children(ctx, el, level + 1);
    let mut block = ContentBlock::new(kind);
    let leads_with_text = children
        .first()
        .is_some_and(|first| first.kind == BlockKind::Paragraph && first.children.is_empty());
    if leads_with_text {
        block.runs = children.remove(0).runs;
    }
    mark_deferred(ctx, &mut children, level + 1);
    block.children = children;
    block
}

fn mark_deferred(ctx: &mut ConvertContext<'_>, children: &mut [ContentBlock], level: usize) {
    if ctx.in_cell() {
        return;
    }
    for child in children {
        if exceeds_depth(&child.kind, level, ctx.config.max_depth) {
            child.deferred = true;
            ctx.stats.deferred_hints += 1;
        }
    }
}

fn is_empty(block: &ContentBlock) -> bool {
    block.runs.is_empty() && block.children.is_empty()
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn convert_list(
    ctx: &mut ConvertContext<'_>,
    list: ElementRef<'_>,
    kind: ListKind,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    let item_kind = match kind {
        ListKind::Bulleted => BlockKind::BulletedItem,
        ListKind::Numbered => BlockKind::NumberedItem,
    };
    let mut items: Vec<ContentBlock> = Vec::new();
    let mut stray = Vec::new();

    for child in list.children() {
        let class = classify(child);
        match class {
            NodeClass::Skip => {}
            NodeClass::Container(li) if li.value().name() == "li" => {
                flush_stray(ctx, &mut stray, &item_kind, &mut items);
                let item = lead_block(ctx, li, item_kind.clone(), level);
                if !is_empty(&item) {
                    items.push(item);
                }
            }
            // `<ul><li>a</li><ul>..</ul></ul>`: the nested list belongs to
            // the preceding item.
            NodeClass::List(nested, nested_kind) if !items.is_empty() => {
                flush_stray(ctx, &mut stray, &item_kind, &mut items);
                let mut nested_items = Vec::new();
                convert_list(ctx, nested, nested_kind, level + 1, &mut nested_items);
                mark_deferred(ctx, &mut nested_items, level + 1);
                if let Some(last) = items.last_mut() {
                    last.children.extend(nested_items);
                }
            }
            _ if class.is_inline() => stray.push(child),
            _ => {
                flush_stray(ctx, &mut stray, &item_kind, &mut items);
                convert_block(ctx, class, level, &mut items);
            }
        }
    }
    flush_stray(ctx, &mut stray, &item_kind, &mut items);
    out.extend(items);
}

/// Inline content directly inside a list becomes an item of its own.
fn flush_stray<'a>(
    ctx: &mut ConvertContext<'_>,
    stray: &mut Vec<NodeRef<'a, Node>>,
    item_kind: &BlockKind,
    items: &mut Vec<ContentBlock>,
) {
    if stray.is_empty() {
        return;
    }
    let segmented = segment_nodes(ctx, stray.drain(..), Annotations::plain());
    if !segmented.runs.is_empty() {
        items.push(ContentBlock::new(item_kind.clone()).with_runs(segmented.runs));
    }
    items.extend(segmented.images);
}

fn convert_definition_list(
    ctx: &mut ConvertContext<'_>,
    list: ElementRef<'_>,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    let mut pending = Vec::new();
    for child in list.children() {
        if let Some(el) = ElementRef::wrap(child).filter(|el| !is_chrome(*el)) {
            match el.value().name() {
                "dt" => {
                    flush_inline(ctx, &mut pending, out);
                    let segmented = segment_nodes(ctx, el.children(), Annotations::bold());
                    if !segmented.runs.is_empty() {
                        out.push(ContentBlock::paragraph(segmented.runs));
                    }
                    out.extend(segmented.images);
                    continue;
                }
                "dd" => {
                    flush_inline(ctx, &mut pending, out);
                    out.extend(convert_children(ctx, el, level));
                    continue;
                }
                "div" => {
                    flush_inline(ctx, &mut pending, out);
                    convert_definition_list(ctx, el, level, out);
                    continue;
                }
                _ => {}
            }
        }
        let class = classify(child);
        if class.is_inline() {
            pending.push(child);
        } else if !matches!(class, NodeClass::Skip) {
            flush_inline(ctx, &mut pending, out);
            convert_block(ctx, class, level, out);
        }
    }
    flush_inline(ctx, &mut pending, out);
}

// ---------------------------------------------------------------------------
// Figures
// ---------------------------------------------------------------------------

fn convert_figure(
    ctx: &mut ConvertContext<'_>,
    figure: ElementRef<'_>,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    let image = figure
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "img" && !is_chrome(*el));
    let Some(image) = image else {
        out.extend(convert_children(ctx, figure, level));
        return;
    };

    let caption = figure
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "figcaption")
        .map(|el| segment_nodes(ctx, el.children(), Annotations::plain()).runs)
        .unwrap_or_default();

    let src = image_src(image);
    let resolved = ctx.images.resolve(src, ctx.base_url());

    if ctx.in_cell() {
        let fallback = match &resolved {
            Some(_) => &ctx.config.cell_image_placeholder,
            None => &ctx.config.unresolved_image_glyph,
        };
        let text = if caption.is_empty() {
            vec![RichTextRun::plain(fallback.clone())]
        } else {
            caption.clone()
        };
        match resolved {
            Some(source) => {
                ctx.cell_images.push(image_block(source, caption));
                ctx.stats.cell_images += 1;
                ctx.stats.images += 1;
            }
            None => ctx.stats.unresolved_images += 1,
        }
        out.push(ContentBlock::paragraph(text));
        return;
    }

    match resolved {
        Some(source) => {
            out.push(image_block(source, caption));
            ctx.stats.images += 1;
        }
        None => {
            warn!(src, "figure image could not be resolved, keeping caption only");
            ctx.stats.unresolved_images += 1;
            if !caption.is_empty() {
                out.push(ContentBlock::paragraph(caption));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Code
// ---------------------------------------------------------------------------

fn convert_code(ctx: &mut ConvertContext<'_>, pre: ElementRef<'_>, out: &mut Vec<ContentBlock>) {
    let mut raw = String::new();
    collect_code_text(*pre, &mut raw);
    let restored = ctx.placeholders.restore_raw(&raw);
    let text = restored
        .strip_prefix("\r\n")
        .or_else(|| restored.strip_prefix('\n'))
        .unwrap_or(&restored)
        .trim_end();
    if text.trim().is_empty() {
        return;
    }

    let max_len = ctx.config.max_run_length;
    if ctx.in_cell() {
        let code = Annotations {
            code: true,
            ..Annotations::default()
        };
        let runs = split_runs(vec![RichTextRun::styled(text, code)], max_len);
        out.push(ContentBlock::paragraph(runs));
        return;
    }

    let runs = split_text(text, max_len)
        .into_iter()
        .map(RichTextRun::plain)
        .collect();
    out.push(
        ContentBlock::new(BlockKind::Code {
            language: detect_language(pre),
        })
        .with_runs(runs),
    );
}

fn collect_code_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(_) => {
                if ElementRef::wrap(child).is_some_and(|el| !is_chrome(el)) {
                    collect_code_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Language hint from `data-language`, `brush: x`, or a
/// `language-`/`lang-`/`highlight-` class on the `pre` or its `code`.
pub fn detect_language(pre: ElementRef<'_>) -> String {
    let code = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "code");
    for el in std::iter::once(pre).chain(code) {
        let value = el.value();
        if let Some(lang) = value.attr("data-language") {
            return normalize_language(lang);
        }
        if let Some(idx) = value.attr("class").and_then(|c| c.find("brush:").map(|i| (c, i))) {
            let (class, i) = idx;
            let name: String = class[i + "brush:".len()..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '+'))
                .collect();
            return normalize_language(&name);
        }
        for class in value.classes() {
            for prefix in ["language-", "lang-", "highlight-"] {
                if let Some(lang) = class.strip_prefix(prefix) {
                    return normalize_language(lang);
                }
            }
        }
    }
    "plain text".to_string()
}

/// Map a language hint onto the target's language vocabulary.
pub fn normalize_language(hint: &str) -> String {
    let lower = hint.trim().to_ascii_lowercase();
    let name = match lower.as_str() {
        "js" | "jscript" | "javascript" | "node" => "javascript",
        "ts" | "typescript" => "typescript",
        "sh" | "shell" | "bash" | "zsh" | "console" => "bash",
        "py" | "python" => "python",
        "yml" | "yaml" => "yaml",
        "html" | "htm" | "xhtml" => "html",
        "xml" | "xsl" | "xslt" => "xml",
        "json" => "json",
        "sql" => "sql",
        "css" => "css",
        "scss" => "scss",
        "java" => "java",
        "groovy" => "groovy",
        "ps" | "ps1" | "powershell" => "powershell",
        "cs" | "csharp" | "c#" => "c#",
        "c" => "c",
        "cpp" | "c++" => "c++",
        "go" | "golang" => "go",
        "rb" | "ruby" => "ruby",
        "rs" | "rust" => "rust",
        "php" => "php",
        "kt" | "kotlin" => "kotlin",
        "swift" => "swift",
        "md" | "markdown" => "markdown",
        "gql" | "graphql" => "graphql",
        "diff" => "diff",
        "docker" | "dockerfile" => "docker",
        _ => "plain text",
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{NoImages, UrlImageResolver};
    use sn2n_shared::{CalloutStyle, Highlight, ImageSource, walk_blocks};

    fn run(html: &str) -> Vec<ContentBlock> {
        convert(html, &ConversionConfig::default(), &UrlImageResolver::default())
            .unwrap()
            .blocks
    }

    fn texts(blocks: &[ContentBlock]) -> Vec<String> {
        blocks.iter().map(ContentBlock::plain_text).collect()
    }

    #[test]
    fn simple_paragraph() {
        let blocks = run("<p>Hello <b>world</b></p>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(
            blocks[0].runs,
            vec![
                RichTextRun::plain("Hello "),
                RichTextRun::styled("world", Annotations::bold()),
            ]
        );
    }

    #[test]
    fn text_before_list_keeps_its_position() {
        let blocks = run("<div>See the following options:<ul><li>One</li><li>Two</li></ul>Done.</div>");
        assert_eq!(
            texts(&blocks),
            vec!["See the following options:", "One", "Two", "Done."]
        );
        assert_eq!(blocks[1].kind, BlockKind::BulletedItem);
        assert_eq!(blocks[3].kind, BlockKind::Paragraph);
    }

    #[test]
    fn nested_list_items_become_children() {
        let blocks = run("<ol><li>Step <ul><li>Detail</li></ul></li></ol>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::NumberedItem);
        assert_eq!(blocks[0].plain_text(), "Step");
        assert_eq!(blocks[0].children.len(), 1);
        assert_eq!(blocks[0].children[0].plain_text(), "Detail");
        assert!(!blocks[0].children[0].deferred);
    }

    #[test]
    fn over_nested_item_is_marked_deferred() {
        let blocks = run("<ul><li>A<ul><li>B<ul><li>Deep</li></ul></li></ul></li></ul>");
        let deep = &blocks[0].children[0].children[0];
        assert_eq!(deep.plain_text(), "Deep");
        assert!(deep.deferred);
        assert!(!blocks[0].children[0].deferred);
    }

    #[test]
    fn sibling_list_attaches_to_previous_item() {
        let blocks = run("<ul><li>Parent</li><ul><li>Child</li></ul></ul>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].children[0].plain_text(), "Child");
    }

    #[test]
    fn nested_callout_is_a_child() {
        let blocks = run(r#"<div class="note">Outer <div class="note">Inner</div></div>"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Callout { style: CalloutStyle::Note });
        assert_eq!(blocks[0].plain_text(), "Outer");
        assert_eq!(blocks[0].children.len(), 1);
        assert_eq!(
            blocks[0].children[0].kind,
            BlockKind::Callout { style: CalloutStyle::Note }
        );
        assert_eq!(blocks[0].children[0].plain_text(), "Inner");
    }

    #[test]
    fn grouping_wrapper_yields_single_callout() {
        let blocks = run(
            r#"<div class="note"><div class="note note_warning"><span class="notetitle">Warning:</span> Back up first.</div></div>"#,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Callout { style: CalloutStyle::Warning });
        assert_eq!(blocks[0].plain_text(), "Warning: Back up first.");
    }

    #[test]
    fn sidenote_class_is_not_a_callout() {
        let blocks = run(r#"<div class="sidenote">Aside text</div>"#);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn code_preserves_whitespace_and_language() {
        let blocks = run(
            "<pre class=\"language-js\">\nvar gr = new GlideRecord('incident');\n  gr.query();\n</pre>",
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Code {
                language: "javascript".into()
            }
        );
        assert_eq!(
            blocks[0].plain_text(),
            "var gr = new GlideRecord('incident');\n  gr.query();"
        );
    }

    #[test]
    fn code_keeps_bracket_tokens() {
        let blocks = run("<pre>gs.info('<plugin name>');</pre>");
        assert_eq!(blocks[0].plain_text(), "gs.info('<plugin name>');");
        assert_eq!(
            blocks[0].kind,
            BlockKind::Code {
                language: "plain text".into()
            }
        );
    }

    #[test]
    fn long_code_is_split_losslessly() {
        let line = "x".repeat(250);
        let blocks = run(&format!("<pre><code class=\"lang-sh\">{line}</code></pre>"));
        assert_eq!(blocks[0].runs.len(), 3);
        assert_eq!(blocks[0].plain_text(), line);
        assert_eq!(blocks[0].kind, BlockKind::Code { language: "bash".into() });
    }

    #[test]
    fn headings_clamp_to_three_levels() {
        let blocks = run("<h1>One</h1><h2>Two</h2><h4>Four</h4>");
        let levels: Vec<_> = blocks
            .iter()
            .map(|b| match b.kind {
                BlockKind::Heading { level } => level,
                _ => 0,
            })
            .collect();
        assert_eq!(levels, vec![1, 2, 3]);
    }

    #[test]
    fn inline_image_follows_paragraph() {
        let blocks = run(r#"<p>Click <img src="https://docs.example.com/icon.png"> the icon.</p>"#);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].plain_text(), "Click the icon.");
        assert!(matches!(blocks[1].kind, BlockKind::Image { .. }));
    }

    #[test]
    fn unresolved_inline_image_is_dropped() {
        let conversion = convert(
            r#"<p>Click <img src="icon.png"> here.</p>"#,
            &ConversionConfig::default(),
            &NoImages,
        )
        .unwrap();
        assert_eq!(conversion.blocks.len(), 1);
        assert_eq!(conversion.stats.unresolved_images, 1);
    }

    #[test]
    fn figure_with_caption() {
        let blocks = run(
            r#"<figure><img src="https://docs.example.com/a.png"><figcaption>Figure 1. Flow</figcaption></figure>"#,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Image {
                source: ImageSource::External {
                    url: "https://docs.example.com/a.png".into()
                }
            }
        );
        assert_eq!(blocks[0].plain_text(), "Figure 1. Flow");
    }

    #[test]
    fn unresolved_figure_keeps_caption() {
        let conversion = convert(
            r#"<figure><img src="a.png"><figcaption>Flow</figcaption></figure>"#,
            &ConversionConfig::default(),
            &NoImages,
        )
        .unwrap();
        assert_eq!(texts(&conversion.blocks), vec!["Flow"]);
        assert_eq!(conversion.blocks[0].kind, BlockKind::Paragraph);
    }

    #[test]
    fn definition_list_terms_are_bold() {
        let blocks = run("<dl><dt>Name</dt><dd><p>The record name.</p></dd></dl>");
        assert_eq!(texts(&blocks), vec!["Name", "The record name."]);
        assert!(blocks[0].runs[0].annotations.bold);
    }

    #[test]
    fn quote_and_divider() {
        let blocks = run("<blockquote>Quoted</blockquote><hr>");
        assert_eq!(blocks[0].kind, BlockKind::Quote);
        assert_eq!(blocks[0].plain_text(), "Quoted");
        assert_eq!(blocks[1].kind, BlockKind::Divider);
    }

    #[test]
    fn chrome_is_not_converted() {
        let blocks = run(
            r#"<nav>Home</nav><div class="miniTOC">On this page</div><script>x()</script><p>Body</p>"#,
        );
        assert_eq!(texts(&blocks), vec!["Body"]);
    }

    #[test]
    fn uicontrol_spans_are_highlighted() {
        let blocks = run(r#"<p>Click <span class="ph uicontrol">Save</span>.</p>"#);
        let save = &blocks[0].runs[1];
        assert_eq!(save.text, "Save");
        assert!(save.annotations.bold);
        assert_eq!(save.annotations.highlight, Some(Highlight::UiControl));
    }

    #[test]
    fn unknown_elements_degrade_to_text() {
        let blocks = run("<p>Keep <widget-x>this</widget-x> text</p>");
        assert_eq!(texts(&blocks), vec!["Keep <widget-x>this</widget-x> text"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ConversionConfig {
            max_depth: 1,
            ..ConversionConfig::default()
        };
        assert!(convert("<p>x</p>", &config, &NoImages).is_err());
    }

    #[test]
    fn conversion_is_deterministic() {
        let html = r#"<h1>T</h1><div class="note">N <ul><li>a<ul><li>b<ul><li>c</li></ul></li></ul></li></ul></div>
            <table><tr><td>x<img src="https://e.com/i.png"></td></tr></table>"#;
        assert_eq!(run(html), run(html));
    }

    #[test]
    fn every_run_respects_the_limit() {
        let long = "word ".repeat(120);
        let html = format!(
            "<p>{long}</p><ul><li><b>{long}</b></li></ul><table><tr><td>{long}</td></tr></table>"
        );
        let blocks = run(&html);
        walk_blocks(&blocks, &mut |block, _| {
            for run in &block.runs {
                assert!(run.char_len() <= 100);
            }
            if let BlockKind::TableRow { cells } = &block.kind {
                for cell in cells {
                    for run in cell {
                        assert!(run.char_len() <= 100);
                    }
                }
            }
        });
    }

    #[test]
    fn depth_rule_for_tables() {
        let table = BlockKind::Table {
            width: 1,
            has_column_header: false,
            has_row_header: false,
        };
        assert!(!exceeds_depth(&table, 1, 2));
        assert!(exceeds_depth(&table, 2, 2));
        assert!(exceeds_depth(&BlockKind::Paragraph, 3, 2));
        assert!(!exceeds_depth(&BlockKind::TableRow { cells: vec![] }, 9, 2));
    }
}
