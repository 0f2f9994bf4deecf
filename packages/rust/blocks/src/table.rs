//! Table conversion.
//!
//! Cells cannot hold blocks, so cell content runs through the normal
//! container walk and is then flattened into runs. Images found in cells are
//! replaced by placeholder text and emitted as image blocks right after the
//! table.

use scraper::ElementRef;

use sn2n_shared::{Annotations, BlockKind, ContentBlock, RichTextRun};

use crate::classify::is_chrome;
use crate::context::ConvertContext;
use crate::convert::convert_children;
use crate::segment::{merge_runs, segment_nodes, split_runs};

/// Largest `colspan` honoured.
const MAX_COLSPAN: usize = 64;

pub(crate) fn convert_table(
    ctx: &mut ConvertContext<'_>,
    table: ElementRef<'_>,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    if ctx.in_cell() {
        flatten_nested_table(ctx, table, level, out);
        return;
    }

    if let Some(caption) = child_elements(table).find(|el| el.value().name() == "caption") {
        let segmented = segment_nodes(ctx, caption.children(), Annotations::plain());
        if !segmented.runs.is_empty() {
            out.push(ContentBlock::paragraph(segmented.runs));
        }
    }

    let rows = table_rows(table);
    let has_thead = child_elements(table).any(|el| {
        el.value().name() == "thead" && child_elements(el).any(|r| r.value().name() == "tr")
    });

    ctx.cell_depth += 1;
    let mut grid: Vec<Vec<Vec<RichTextRun>>> = Vec::with_capacity(rows.len());
    let mut starts_with_th = Vec::with_capacity(rows.len());
    let mut first_row_has_image = false;
    for row in &rows {
        let mut cells = Vec::new();
        let mut first_is_th = None;
        for cell in child_elements(*row).filter(|el| matches!(el.value().name(), "td" | "th")) {
            if first_is_th.is_none() {
                first_is_th = Some(cell.value().name() == "th");
            }
            cells.push(flatten_cell(ctx, cell));
            for _ in 1..colspan(cell) {
                cells.push(Vec::new());
            }
        }
        if cells.is_empty() {
            continue;
        }
        if grid.is_empty() {
            first_row_has_image = row
                .descendants()
                .filter_map(ElementRef::wrap)
                .any(|el| el.value().name() == "img");
        }
        grid.push(cells);
        starts_with_th.push(first_is_th.unwrap_or(false));
    }
    ctx.cell_depth -= 1;

    let moved_images = std::mem::take(&mut ctx.cell_images);
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        out.extend(moved_images);
        return;
    }
    for row in &mut grid {
        row.resize_with(width, Vec::new);
    }

    // Image-bearing first rows are data, not headers.
    let has_column_header = has_thead || !first_row_has_image;
    let body = if has_column_header {
        &starts_with_th[1..]
    } else {
        &starts_with_th[..]
    };
    let has_row_header = !body.is_empty() && body.iter().all(|th| *th);

    let children = grid
        .into_iter()
        .map(|cells| ContentBlock::new(BlockKind::TableRow { cells }))
        .collect();
    out.push(
        ContentBlock::new(BlockKind::Table {
            width,
            has_column_header,
            has_row_header,
        })
        .with_children(children),
    );
    out.extend(moved_images);
}

/// A table inside a cell contributes its cell content as plain blocks.
fn flatten_nested_table(
    ctx: &mut ConvertContext<'_>,
    table: ElementRef<'_>,
    level: usize,
    out: &mut Vec<ContentBlock>,
) {
    for row in table_rows(table) {
        for cell in child_elements(row).filter(|el| matches!(el.value().name(), "td" | "th")) {
            out.extend(convert_children(ctx, cell, level));
        }
    }
}

fn flatten_cell(ctx: &mut ConvertContext<'_>, cell: ElementRef<'_>) -> Vec<RichTextRun> {
    let blocks = convert_children(ctx, cell, 1);
    let mut runs = Vec::new();
    flatten_blocks(&blocks, &mut runs);
    split_runs(merge_runs(runs), ctx.config.max_run_length)
}

fn flatten_blocks(blocks: &[ContentBlock], runs: &mut Vec<RichTextRun>) {
    for block in blocks {
        if !block.runs.is_empty() {
            if !runs.is_empty() {
                runs.push(RichTextRun::plain("\n"));
            }
            runs.extend(block.runs.iter().cloned());
        }
        flatten_blocks(&block.children, runs);
    }
}

fn child_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| !is_chrome(*child))
}

/// Rows of `table` itself, excluding rows of nested tables.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child_elements(child).filter(|r| r.value().name() == "tr"));
            }
            _ => {}
        }
    }
    rows
}

fn colspan(cell: ElementRef<'_>) -> usize {
    cell.value()
        .attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_COLSPAN)
}

#[cfg(test)]
mod tests {
    use sn2n_shared::{ConversionConfig, runs_text};

    use crate::convert::convert;
    use crate::images::{NoImages, UrlImageResolver};

    use super::*;

    fn run(html: &str) -> Vec<ContentBlock> {
        convert(html, &ConversionConfig::default(), &UrlImageResolver::default())
            .unwrap()
            .blocks
    }

    fn table_shape(block: &ContentBlock) -> (usize, bool, bool) {
        match block.kind {
            BlockKind::Table {
                width,
                has_column_header,
                has_row_header,
            } => (width, has_column_header, has_row_header),
            _ => panic!("expected a table, got {}", block.kind.name()),
        }
    }

    fn cell_text(block: &ContentBlock, row: usize, col: usize) -> String {
        match &block.children[row].kind {
            BlockKind::TableRow { cells } => runs_text(&cells[col]),
            _ => panic!("expected a row"),
        }
    }

    #[test]
    fn thead_marks_column_header() {
        let blocks = run(
            "<table><thead><tr><th>Name</th><th>Value</th></tr></thead>\
             <tbody><tr><td>a</td><td>1</td></tr></tbody></table>",
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(table_shape(&blocks[0]), (2, true, false));
        assert_eq!(cell_text(&blocks[0], 1, 0), "a");
    }

    #[test]
    fn cell_image_moves_after_table() {
        let blocks = run(
            r#"<table><tr><td>Icon</td><td><img src="https://docs.example.com/i.png"></td></tr></table><p>After</p>"#,
        );
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[0].kind, BlockKind::Table { .. }));
        assert_eq!(cell_text(&blocks[0], 0, 1), "See image below");
        assert!(matches!(blocks[1].kind, BlockKind::Image { .. }));
        assert_eq!(blocks[2].plain_text(), "After");
        assert!(blocks[0]
            .children
            .iter()
            .all(|row| matches!(row.kind, BlockKind::TableRow { .. })));
    }

    #[test]
    fn image_in_first_row_disables_header() {
        let blocks = run(
            r#"<table><tr><td><img src="https://docs.example.com/i.png"></td></tr><tr><td>x</td></tr></table>"#,
        );
        assert_eq!(table_shape(&blocks[0]), (1, false, false));
    }

    #[test]
    fn unresolved_cell_image_gets_glyph() {
        let conversion = convert(
            r#"<table><tr><td>Icon <img src="i.png"></td></tr></table>"#,
            &ConversionConfig::default(),
            &NoImages,
        )
        .unwrap();
        assert_eq!(conversion.blocks.len(), 1);
        assert_eq!(cell_text(&conversion.blocks[0], 0, 0), "Icon •");
        assert_eq!(conversion.stats.unresolved_images, 1);
    }

    #[test]
    fn captioned_figure_in_cell_uses_caption() {
        let blocks = run(
            r#"<table><tr><td><figure><img src="https://docs.example.com/f.png"><figcaption>Form view</figcaption></figure></td></tr></table>"#,
        );
        assert_eq!(cell_text(&blocks[0], 0, 0), "Form view");
        assert_eq!(blocks[1].plain_text(), "Form view");
    }

    #[test]
    fn short_rows_are_padded_and_colspan_expanded() {
        let blocks = run(
            r#"<table><tr><th>A</th><th>B</th><th>C</th></tr><tr><td colspan="2">wide</td></tr></table>"#,
        );
        let (width, _, _) = table_shape(&blocks[0]);
        assert_eq!(width, 3);
        for row in &blocks[0].children {
            if let BlockKind::TableRow { cells } = &row.kind {
                assert_eq!(cells.len(), 3);
            }
        }
        assert_eq!(cell_text(&blocks[0], 1, 0), "wide");
        assert_eq!(cell_text(&blocks[0], 1, 1), "");
    }

    #[test]
    fn row_headers_detected() {
        let blocks = run(
            "<table><thead><tr><th></th><th>Value</th></tr></thead>\
             <tr><th>a</th><td>1</td></tr><tr><th>b</th><td>2</td></tr></table>",
        );
        assert_eq!(table_shape(&blocks[0]), (2, true, true));
    }

    #[test]
    fn block_content_in_cells_is_flattened() {
        let blocks = run(
            r#"<table><tr><td><p>First</p><ul><li>one</li><li>two</li></ul><div class="note">Cell note</div></td></tr></table>"#,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(cell_text(&blocks[0], 0, 0), "First\none\ntwo\nCell note");
    }

    #[test]
    fn nested_table_is_flattened_into_cell() {
        let blocks = run(
            "<table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>",
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(cell_text(&blocks[0], 0, 0), "outer\ninner");
    }

    #[test]
    fn caption_precedes_table() {
        let blocks = run("<table><caption>Table 1. Roles</caption><tr><td>admin</td></tr></table>");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[0].plain_text(), "Table 1. Roles");
        assert!(matches!(blocks[1].kind, BlockKind::Table { .. }));
    }
}
