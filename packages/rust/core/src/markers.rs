//! Marker resolution: split a natural block tree into what one create
//! request accepts and the groups appended afterwards.
//!
//! The target appends children at the end of a parent, so when a child
//! cannot be written in place, it and every later sibling move into one
//! deferred group filed under a fresh marker on the parent. Groups are
//! resolved again relative to their own append request, and their markers
//! are always allocated after their parent's, so appending in marker order
//! attaches every parent before its nested deferrals.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use sn2n_blocks::exceeds_depth;
use sn2n_shared::{BlockKind, ContentBlock, DeferredBlocks, MarkerId, Result, Sn2nError};

/// A tree that fits the depth limit plus the blocks to append later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub tree: Vec<ContentBlock>,
    pub deferred: DeferredBlocks,
}

impl Resolved {
    /// Number of secondary append calls needed to complete the page.
    pub fn append_count(&self) -> usize {
        self.deferred.len()
    }
}

#[derive(Default)]
struct Allocator {
    next: u32,
    pending: VecDeque<(MarkerId, Vec<ContentBlock>)>,
}

impl Allocator {
    fn defer(&mut self, group: Vec<ContentBlock>) -> MarkerId {
        self.next += 1;
        let id = MarkerId(self.next);
        self.pending.push_back((id, group));
        id
    }
}

/// Resolve `tree` against `max_depth` levels per write.
///
/// Fails only when `max_depth` is below 2, the minimum a table needs.
#[instrument(skip_all, fields(blocks = tree.len(), max_depth))]
pub fn resolve(mut tree: Vec<ContentBlock>, max_depth: usize) -> Result<Resolved> {
    if max_depth < 2 {
        return Err(Sn2nError::config(format!(
            "max_depth must be at least 2, got {max_depth}"
        )));
    }

    let mut alloc = Allocator::default();
    prune_forest(&mut tree, max_depth, &mut alloc);

    let mut deferred = DeferredBlocks::new();
    while let Some((id, mut group)) = alloc.pending.pop_front() {
        prune_forest(&mut group, max_depth, &mut alloc);
        // The group root keeps the marker it was filed under.
        if let Some(first) = group.first_mut() {
            first.deferred = true;
            first.marker_id = Some(id);
        }
        deferred.insert(id, group);
    }

    debug!(
        top_level = tree.len(),
        markers = deferred.len(),
        "marker resolution complete"
    );
    Ok(Resolved { tree, deferred })
}

/// Rebuild the natural tree from a resolved one.
pub fn reattach(tree: &[ContentBlock], deferred: &DeferredBlocks) -> Vec<ContentBlock> {
    tree.iter().map(|block| restore(block, deferred)).collect()
}

fn restore(block: &ContentBlock, deferred: &DeferredBlocks) -> ContentBlock {
    let mut children: Vec<ContentBlock> =
        block.children.iter().map(|c| restore(c, deferred)).collect();
    for marker in &block.markers {
        if let Some(group) = deferred.get(marker) {
            children.extend(group.iter().map(|c| restore(c, deferred)));
        }
    }
    let mut out = block.clone();
    out.children = children;
    out.deferred = false;
    out.marker_id = None;
    out.markers.clear();
    out
}

/// Top-level blocks of a request sit at level 1.
fn prune_forest(blocks: &mut [ContentBlock], max_depth: usize, alloc: &mut Allocator) {
    for block in blocks {
        clear_flags(block);
        prune_children(block, 1, max_depth, alloc);
    }
}

fn prune_children(parent: &mut ContentBlock, level: usize, max_depth: usize, alloc: &mut Allocator) {
    // Rows travel with their table.
    if matches!(parent.kind, BlockKind::Table { .. }) {
        for row in &mut parent.children {
            clear_flags(row);
        }
        return;
    }

    let child_level = level + 1;
    let cut = parent
        .children
        .iter()
        .position(|child| exceeds_depth(&child.kind, child_level, max_depth));
    let tail = cut.map(|at| parent.children.split_off(at));

    for child in &mut parent.children {
        clear_flags(child);
        prune_children(child, child_level, max_depth, alloc);
    }

    if let Some(tail) = tail {
        let id = alloc.defer(tail);
        parent.markers.push(id);
    }
}

fn clear_flags(block: &mut ContentBlock) {
    block.deferred = false;
    block.marker_id = None;
    block.markers.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sn2n_blocks::{UrlImageResolver, convert};
    use sn2n_shared::{ConversionConfig, RichTextRun, walk_blocks};

    fn natural(html: &str) -> Vec<ContentBlock> {
        convert(html, &ConversionConfig::default(), &UrlImageResolver::default())
            .unwrap()
            .blocks
    }

    fn item(text: &str, children: Vec<ContentBlock>) -> ContentBlock {
        ContentBlock::new(BlockKind::BulletedItem)
            .with_runs(vec![RichTextRun::plain(text)])
            .with_children(children)
    }

    fn all_text(blocks: &[ContentBlock]) -> Vec<String> {
        let mut out = Vec::new();
        walk_blocks(blocks, &mut |b, _| out.push(b.plain_text()));
        out
    }

    fn max_depth_of(blocks: &[ContentBlock]) -> usize {
        blocks.iter().map(ContentBlock::depth).max().unwrap_or(0)
    }

    fn strip_flags(blocks: &mut [ContentBlock]) {
        for block in blocks {
            clear_flags(block);
            strip_flags(&mut block.children);
        }
    }

    #[test]
    fn three_level_list_defers_deepest_item() {
        let tree = natural("<ul><li>Top<ul><li>Middle<ul><li>Deep</li></ul></li></ul></li></ul>");
        let resolved = resolve(tree, 2).unwrap();

        assert_eq!(resolved.deferred.len(), 1);
        let (id, group) = resolved.deferred.iter().next().unwrap();
        assert_eq!(all_text(group), vec!["Deep"]);
        assert!(group[0].deferred);
        assert_eq!(group[0].marker_id, Some(*id));

        // The marker sits on the block whose child was moved.
        let middle = &resolved.tree[0].children[0];
        assert_eq!(middle.plain_text(), "Middle");
        assert_eq!(middle.markers, vec![*id]);
        assert!(middle.children.is_empty());
        assert!(max_depth_of(&resolved.tree) <= 2);
    }

    #[test]
    fn only_overflowing_levels_move() {
        let tree = vec![item(
            "top",
            vec![
                item("kept", vec![]),
                item("deep parent", vec![item("deep", vec![])]),
                item("after", vec![]),
            ],
        )];
        let resolved = resolve(tree, 2).unwrap();
        let top = &resolved.tree[0];
        assert_eq!(top.children.len(), 3);
        assert!(top.markers.is_empty());
        assert_eq!(top.children[1].markers.len(), 1);
        let group = &resolved.deferred[&top.children[1].markers[0]];
        assert_eq!(all_text(group), vec!["deep"]);
        assert_eq!(top.children[2].plain_text(), "after");
    }

    #[test]
    fn nested_table_in_list_item_is_deferred_whole() {
        let tree = natural("<ol><li>Step<table><tr><td>a</td></tr></table><p>after</p></li></ol>");
        let resolved = resolve(tree, 2).unwrap();
        let step = &resolved.tree[0];
        assert!(step.children.is_empty());
        let group = &resolved.deferred[&step.markers[0]];
        assert!(matches!(group[0].kind, BlockKind::Table { .. }));
        assert_eq!(group[0].children.len(), 1);
        assert_eq!(group.last().map(ContentBlock::plain_text).as_deref(), Some("after"));
    }

    #[test]
    fn deferred_groups_are_resolved_again() {
        // Five levels with max_depth 2: the group holding level 3 still
        // nests too deep and files its own marker after its parent's.
        let tree = vec![item(
            "1",
            vec![item("2", vec![item("3", vec![item("4", vec![item("5", vec![])])])])],
        )];
        let resolved = resolve(tree, 2).unwrap();
        assert_eq!(resolved.deferred.len(), 2);
        let ids: Vec<_> = resolved.deferred.keys().copied().collect();
        assert!(ids[0] < ids[1]);
        let first = &resolved.deferred[&ids[0]];
        assert_eq!(first[0].plain_text(), "3");
        assert_eq!(first[0].children[0].markers, vec![ids[1]]);
        for group in resolved.deferred.values() {
            assert!(max_depth_of(group) <= 2);
        }
    }

    #[test]
    fn reattach_restores_the_natural_tree() {
        let mut tree = natural(
            "<ul><li>a<ul><li>b<ul><li>c</li><li>d</li></ul></li></ul></li></ul><p>tail</p>",
        );
        let resolved = resolve(tree.clone(), 2).unwrap();
        strip_flags(&mut tree);
        assert_eq!(reattach(&resolved.tree, &resolved.deferred), tree);
    }

    #[test]
    fn rejects_depth_below_two() {
        assert!(resolve(Vec::new(), 1).is_err());
    }

    fn block_tree() -> impl Strategy<Value = ContentBlock> {
        let leaf = prop_oneof![
            "[a-z]{1,5}".prop_map(|t| item(&t, vec![])),
            Just(
                ContentBlock::new(BlockKind::Table {
                    width: 1,
                    has_column_header: false,
                    has_row_header: false,
                })
                .with_children(vec![ContentBlock::new(BlockKind::TableRow {
                    cells: vec![vec![RichTextRun::plain("cell")]],
                })])
            ),
        ];
        leaf.prop_recursive(6, 48, 4, |inner| {
            ("[a-z]{1,5}", prop::collection::vec(inner, 0..4))
                .prop_map(|(text, children)| item(&text, children))
        })
    }

    proptest! {
        #[test]
        fn resolution_respects_depth_and_round_trips(
            tree in prop::collection::vec(block_tree(), 1..4),
            max_depth in 2usize..4,
        ) {
            let resolved = resolve(tree.clone(), max_depth).unwrap();
            prop_assert!(max_depth_of(&resolved.tree) <= max_depth);
            for group in resolved.deferred.values() {
                prop_assert!(!group.is_empty());
                prop_assert!(max_depth_of(group) <= max_depth);
            }

            // Every referenced marker has exactly one group and vice versa.
            let mut referenced = Vec::new();
            let mut collect = |b: &ContentBlock, _| referenced.extend(b.markers.iter().copied());
            walk_blocks(&resolved.tree, &mut collect);
            for group in resolved.deferred.values() {
                walk_blocks(group, &mut collect);
            }
            referenced.sort();
            let keys: Vec<_> = resolved.deferred.keys().copied().collect();
            prop_assert_eq!(referenced, keys);

            let mut expected = tree;
            strip_flags(&mut expected);
            prop_assert_eq!(reattach(&resolved.tree, &resolved.deferred), expected);
        }
    }
}
