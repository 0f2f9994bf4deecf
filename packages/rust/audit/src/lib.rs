//! Completeness audit of converted pages.
//!
//! [`audit`] compares canonical text and element counts between the source
//! HTML and the produced block tree; [`diagnose`] turns a failed report into
//! prioritized fix suggestions.

pub mod advisor;
pub mod diff;
pub mod extract;

pub use advisor::diagnose;
pub use diff::{SpanDiff, diff_segments};
pub use extract::{ProducedExtract, SourceExtract, extract_produced, extract_source, total_chars};

use tracing::{debug, instrument, warn};

use sn2n_shared::{AuditConfig, AuditReport, ContentBlock, CountMismatch, ElementKind, Result};

/// Audit `produced` against `source_html`.
///
/// `produced` must be the natural tree, before deferred blocks are split
/// out. A failed audit is a normal outcome; errors are only returned for an
/// invalid `config`.
#[instrument(skip_all, fields(source_len = source_html.len(), blocks = produced.len()))]
pub fn audit(
    source_html: &str,
    produced: &[ContentBlock],
    config: &AuditConfig,
) -> Result<AuditReport> {
    config.validate()?;

    let source = extract_source(source_html);
    let output = extract_produced(produced);
    let source_chars = total_chars(&source.segments);
    let produced_chars = total_chars(&output.segments);
    let coverage = coverage(source_chars, produced_chars);

    let mismatches: Vec<CountMismatch> = ElementKind::ALL
        .into_iter()
        .filter(|kind| source.counts.get(*kind) != output.counts.get(*kind))
        .map(|kind| CountMismatch {
            kind,
            source: source.counts.get(kind),
            produced: output.counts.get(kind),
            critical: config.is_critical(kind),
        })
        .collect();

    let in_band = coverage >= config.min_coverage && coverage <= config.max_coverage;
    let passed = in_band && !mismatches.iter().any(|m| m.critical);

    let (missing_spans, extra_spans) = if passed {
        (Vec::new(), Vec::new())
    } else {
        let diff = diff_segments(&source.segments, &output.segments, config.lcs_cell_limit);
        (
            diff.missing.into_iter().take(config.sample_size).collect(),
            diff.extra.into_iter().take(config.sample_size).collect(),
        )
    };

    let report = AuditReport {
        coverage,
        source_chars,
        produced_chars,
        source_node_count: source.segments.len(),
        produced_block_count: output.block_count,
        source_counts: source.counts,
        produced_counts: output.counts,
        mismatches,
        missing_spans,
        extra_spans,
        passed,
    };

    if report.passed {
        debug!(coverage = report.coverage, "audit passed");
    } else {
        warn!(
            coverage = report.coverage,
            critical = report.critical_mismatches().count(),
            missing = report.missing_spans.len(),
            "audit failed"
        );
    }
    Ok(report)
}

/// Produced characters over source characters. An empty source is fully
/// covered by an empty output; otherwise the denominator is at least one.
pub fn coverage(source_chars: usize, produced_chars: usize) -> f64 {
    if source_chars == 0 && produced_chars == 0 {
        return 1.0;
    }
    produced_chars as f64 / source_chars.max(1) as f64
}
