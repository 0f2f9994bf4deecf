//! Segment-level diff between source and produced text.
//!
//! A longest-common-subsequence alignment over canonical segments finds
//! what went missing and what appeared. Large pages fall back to a multiset
//! difference, which loses ordering but stays linear.

use std::collections::HashMap;

use tracing::debug;

use sn2n_shared::TextNode;

/// Segments present on one side only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanDiff {
    pub missing: Vec<TextNode>,
    pub extra: Vec<TextNode>,
}

/// Align `source` and `produced` segments.
///
/// Segment boundaries differ between the sides (a list item with a nested
/// paragraph is one source segment but two blocks), so a missing span whose
/// text still appears somewhere in the output is not reported, and the same
/// for extra spans found in the source. Repeated output is always reported.
pub fn diff_segments(source: &[TextNode], produced: &[TextNode], cell_limit: usize) -> SpanDiff {
    let (missing_idx, extra_idx) = if source.len().saturating_mul(produced.len()) <= cell_limit {
        lcs_unmatched(source, produced)
    } else {
        debug!(
            source = source.len(),
            produced = produced.len(),
            "segment grid too large, using multiset difference"
        );
        multiset_unmatched(source, produced)
    };

    let produced_text = joined(produced);
    let source_text = joined(source);
    let mut produced_seen: HashMap<&str, usize> = HashMap::new();
    for node in produced {
        *produced_seen.entry(node.text.as_str()).or_default() += 1;
    }
    let mut source_seen: HashMap<&str, usize> = HashMap::new();
    for node in source {
        *source_seen.entry(node.text.as_str()).or_default() += 1;
    }

    let missing = missing_idx
        .into_iter()
        .map(|i| &source[i])
        .filter(|node| !produced_text.contains(node.text.as_str()))
        .cloned()
        .collect();
    let extra = extra_idx
        .into_iter()
        .map(|i| &produced[i])
        .filter(|node| {
            let repeated = produced_seen.get(node.text.as_str()).copied().unwrap_or(0)
                > source_seen.get(node.text.as_str()).copied().unwrap_or(0);
            repeated || !source_text.contains(node.text.as_str())
        })
        .cloned()
        .collect();

    SpanDiff { missing, extra }
}

fn joined(nodes: &[TextNode]) -> String {
    nodes
        .iter()
        .map(|n| n.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Indices of unmatched source and produced segments under an LCS alignment.
fn lcs_unmatched(a: &[TextNode], b: &[TextNode]) -> (Vec<usize>, Vec<usize>) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i].text == b[j].text {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut missing = Vec::new();
    let mut extra = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i].text == b[j].text {
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            missing.push(i);
            i += 1;
        } else {
            extra.push(j);
            j += 1;
        }
    }
    missing.extend(i..n);
    extra.extend(j..m);
    (missing, extra)
}

fn multiset_unmatched(a: &[TextNode], b: &[TextNode]) -> (Vec<usize>, Vec<usize>) {
    let mut available: HashMap<&str, usize> = HashMap::new();
    for node in b {
        *available.entry(node.text.as_str()).or_default() += 1;
    }
    let mut missing = Vec::new();
    for (i, node) in a.iter().enumerate() {
        match available.get_mut(node.text.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(i),
        }
    }

    let mut available: HashMap<&str, usize> = HashMap::new();
    for node in a {
        *available.entry(node.text.as_str()).or_default() += 1;
    }
    let mut extra = Vec::new();
    for (j, node) in b.iter().enumerate() {
        match available.get_mut(node.text.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => extra.push(j),
        }
    }
    (missing, extra)
}
