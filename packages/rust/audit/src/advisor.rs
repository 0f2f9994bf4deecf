//! Failure-pattern classification and remediation suggestions.
//!
//! Purely advisory: nothing here mutates the tree or retries.

use std::collections::HashMap;

use tracing::{debug, instrument};

use sn2n_shared::{
    AuditReport, ContentBlock, CountMismatch, ElementKind, Priority, Recommendation, TextNode,
    walk_blocks,
};

use crate::extract::{extract_produced, extract_source};

/// Shortest produced segment considered when looking for duplicated output.
const MIN_DUPLICATE_LEN: usize = 20;

/// Classify why `report` failed and suggest fixes, most urgent first.
///
/// Returns nothing for a passing report.
#[instrument(skip_all, fields(coverage = report.coverage, passed = report.passed))]
pub fn diagnose(
    source_html: &str,
    produced: &[ContentBlock],
    report: &AuditReport,
) -> Vec<Recommendation> {
    if report.passed {
        return Vec::new();
    }

    let source = extract_source(source_html);
    let output = extract_produced(produced);
    let low = report.coverage < 1.0;

    let mut recs = Vec::new();

    for kind in [ElementKind::OrderedList, ElementKind::UnorderedList] {
        if let Some(m) = report.mismatch(kind).filter(|m| m.delta() < 0) {
            if low {
                recs.push(missing_list(m));
            }
        }
    }

    if report.produced_chars > report.source_chars && !low {
        recs.push(duplicate_content(report, &source.segments, &output.segments));
    }

    for m in report.mismatches.iter().filter(|m| m.delta() != 0) {
        if let Some(rec) = element_mismatch(m) {
            recs.push(rec);
        }
    }

    if source.max_nesting > output.max_nesting {
        recs.push(Recommendation {
            priority: Priority::Medium,
            action: "Preserve nested lists and callouts as children instead of flattening them"
                .into(),
            reason: format!(
                "source nests {} levels of lists, callouts or quotes but the output keeps {}",
                source.max_nesting, output.max_nesting
            ),
            expected_impact: "restores structure and the text lost with flattened levels".into(),
        });
    }

    let deferred = count_deferred(produced);
    if deferred > 0 {
        recs.push(Recommendation {
            priority: Priority::Low,
            action: "Confirm the persistence step performs every deferred append".into(),
            reason: format!("{deferred} blocks sit beyond the depth limit and are attached later"),
            expected_impact: "deferred content is only visible after its append succeeds".into(),
        });
    }

    if low && !report.missing_spans.is_empty() {
        let sample: Vec<_> = report
            .missing_spans
            .iter()
            .take(3)
            .map(|span| format!("\"{}\" ({})", preview(&span.text), span.path))
            .collect();
        recs.push(Recommendation {
            priority: Priority::Low,
            action: "Inspect the source elements holding the missing text".into(),
            reason: format!(
                "{} source spans have no counterpart, e.g. {}",
                report.missing_spans.len(),
                sample.join(", ")
            ),
            expected_impact: format!(
                "closes the {:.1}% coverage gap",
                (1.0 - report.coverage) * 100.0
            ),
        });
    }

    recs.sort_by_key(|r| r.priority);
    debug!(recommendations = recs.len(), "diagnosis complete");
    recs
}

fn missing_list(m: &CountMismatch) -> Recommendation {
    let list = if m.kind == ElementKind::OrderedList {
        "numbered"
    } else {
        "bulleted"
    };
    Recommendation {
        priority: Priority::High,
        action: format!("Check {list} list conversion for dropped items"),
        reason: format!(
            "{} of {} {list} list items are missing and coverage is below the band",
            m.source - m.produced,
            m.source
        ),
        expected_impact: "recovers the text of the dropped list items".into(),
    }
}

fn duplicate_content(
    report: &AuditReport,
    source: &[TextNode],
    produced: &[TextNode],
) -> Recommendation {
    let mut source_counts: HashMap<&str, usize> = HashMap::new();
    for node in source {
        *source_counts.entry(node.text.as_str()).or_default() += 1;
    }
    let mut produced_counts: HashMap<&str, usize> = HashMap::new();
    for node in produced
        .iter()
        .filter(|n| n.text.chars().count() >= MIN_DUPLICATE_LEN)
    {
        *produced_counts.entry(node.text.as_str()).or_default() += 1;
    }
    let mut repeated: Vec<_> = produced_counts
        .into_iter()
        .filter(|(text, count)| *count > source_counts.get(text).copied().unwrap_or(0).max(1))
        .map(|(text, _)| text)
        .collect();
    repeated.sort_unstable();

    let excess = report.coverage_percent() - 100.0;
    if repeated.is_empty() {
        Recommendation {
            priority: Priority::Medium,
            action: "Look for content converted twice, such as a callout also emitted as text"
                .into(),
            reason: format!("output is {excess:.1}% longer than the source"),
            expected_impact: "brings coverage back inside the acceptance band".into(),
        }
    } else {
        Recommendation {
            priority: Priority::High,
            action: "Remove duplicated blocks from the output".into(),
            reason: format!(
                "{} text spans appear more often than in the source, e.g. \"{}\"",
                repeated.len(),
                preview(repeated[0])
            ),
            expected_impact: format!("removes about {excess:.1}% excess content"),
        }
    }
}

fn element_mismatch(m: &CountMismatch) -> Option<Recommendation> {
    let (priority, action, impact) = match (m.kind, m.delta() < 0) {
        (ElementKind::Callout, true) => (
            Priority::High,
            "Check callout detection: a callout may be excluded as a grouping container or lost \
             inside another block",
            "restores the missing notes and warnings",
        ),
        (ElementKind::Callout, false) => (
            Priority::High,
            "Check callout detection: a wrapper element may be counted as its own callout",
            "removes phantom callouts",
        ),
        (ElementKind::Table, _) => (
            Priority::High,
            "Check table conversion, including tables nested in cells or list items",
            "table structure matches the source",
        ),
        (ElementKind::Image, true) => (
            Priority::Medium,
            "Check image resolution; unresolved images outside tables are dropped",
            "images appear in the output",
        ),
        (ElementKind::Image, false) => (
            Priority::Medium,
            "Check for images emitted twice, such as a figure image also found inline",
            "image count matches the source",
        ),
        (ElementKind::Heading, _) => (
            Priority::Medium,
            "Check heading conversion for empty or wrapped headings",
            "section structure matches the source",
        ),
        (ElementKind::Code, _) => (
            Priority::Medium,
            "Check code sample conversion for empty or nested pre elements",
            "code samples match the source",
        ),
        // List and paragraph counts shift with restructuring.
        _ => return None,
    };
    Some(Recommendation {
        priority,
        action: action.into(),
        reason: format!(
            "{} count differs: source {}, output {}",
            m.kind, m.source, m.produced
        ),
        expected_impact: impact.into(),
    })
}

fn count_deferred(blocks: &[ContentBlock]) -> usize {
    let mut count = 0;
    walk_blocks(blocks, &mut |block, _| {
        if block.deferred || !block.markers.is_empty() {
            count += 1;
        }
    });
    count
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    if text.chars().count() <= MAX {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX).collect();
    format!("{cut}...")
}
