//! Page pipeline: HTML → blocks → audit → markers, one page or many.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

use sn2n_audit::{audit, diagnose};
use sn2n_blocks::{ConversionStats, ImageResolver, UrlImageResolver, convert};
use sn2n_shared::{
    AppConfig, AuditConfig, AuditReport, BlockKind, ContentBlock, ConversionConfig,
    DeferredBlocks, Recommendation, Result, Sn2nError,
};

use crate::markers::resolve;

/// Everything one page conversion needs besides its HTML.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub conversion: ConversionConfig,
    pub audit: AuditConfig,
    /// Accept inline `data:` image URLs.
    pub allow_data_urls: bool,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            conversion: ConversionConfig::from(config),
            audit: AuditConfig::from(config),
            allow_data_urls: config.images.allow_data_urls,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        self.audit.validate()
    }

    /// The default image resolver for this configuration.
    pub fn image_resolver(&self) -> UrlImageResolver {
        UrlImageResolver::new(self.allow_data_urls)
    }
}

/// One page to convert.
#[derive(Debug, Clone)]
pub struct PageInput {
    /// Title override; defaults to the first level-1 heading.
    pub title: Option<String>,
    /// Address of the page, used to resolve relative links and images.
    pub source_url: Option<Url>,
    pub html: String,
}

impl PageInput {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            title: None,
            source_url: None,
            html: html.into(),
        }
    }

    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = Some(url);
        self
    }
}

/// Result of converting one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConversion {
    pub title: Option<String>,
    /// Tree for the create request; fits the depth limit.
    pub blocks: Vec<ContentBlock>,
    /// Groups for the secondary append requests, in append order.
    pub deferred: DeferredBlocks,
    pub audit: AuditReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    pub stats: ConversionStats,
    /// SHA-256 of the input HTML.
    pub source_hash: String,
}

impl PageConversion {
    pub fn passed(&self) -> bool {
        self.audit.passed
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

/// Convert a single page.
///
/// The audit runs on the natural tree, before blocks are split out under
/// markers. A failed audit is reported in the result, not as an error.
#[instrument(skip_all, fields(url = ?input.source_url, html_len = input.html.len()))]
pub fn convert_page(
    input: &PageInput,
    config: &PipelineConfig,
    images: &dyn ImageResolver,
) -> Result<PageConversion> {
    config.validate()?;

    let mut conversion_config = config.conversion.clone();
    if let Some(url) = &input.source_url {
        conversion_config.base_url = Some(url.clone());
    }

    let natural = convert(&input.html, &conversion_config, images)?;
    let report = audit(&input.html, &natural.blocks, &config.audit)?;
    let recommendations = if report.passed {
        Vec::new()
    } else {
        diagnose(&input.html, &natural.blocks, &report)
    };

    let title = input
        .title
        .clone()
        .or_else(|| first_title(&natural.blocks));
    let resolved = resolve(natural.blocks, conversion_config.max_depth)?;

    if !report.passed {
        warn!(
            title = title.as_deref().unwrap_or(""),
            coverage = report.coverage,
            recommendations = recommendations.len(),
            "page failed completeness audit"
        );
    }

    Ok(PageConversion {
        title,
        blocks: resolved.tree,
        deferred: resolved.deferred,
        audit: report,
        recommendations,
        stats: natural.stats,
        source_hash: source_hash(&input.html),
    })
}

fn first_title(blocks: &[ContentBlock]) -> Option<String> {
    blocks
        .iter()
        .find(|b| matches!(b.kind, BlockKind::Heading { level: 1 }))
        .map(ContentBlock::plain_text)
        .filter(|t| !t.trim().is_empty())
}

fn source_hash(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Batch driver
// ---------------------------------------------------------------------------

/// Progress callback for batch conversion.
pub trait ProgressReporter: Send + Sync {
    /// Called when a page finishes, in completion order.
    fn page_converted(&self, label: &str, current: usize, total: usize);
    /// Called once when the batch completes.
    fn done(&self, summary: &BatchSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn page_converted(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &BatchSummary) {}
}

/// Totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub pages: usize,
    pub passed: usize,
    pub failed_audit: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn from_results(results: &[Result<PageConversion>], elapsed: Duration) -> Self {
        let mut summary = Self {
            pages: results.len(),
            elapsed,
            ..Self::default()
        };
        for result in results {
            match result {
                Ok(page) if page.passed() => summary.passed += 1,
                Ok(_) => summary.failed_audit += 1,
                Err(_) => summary.errors += 1,
            }
        }
        summary
    }

    /// Whether every page converted and passed its audit.
    pub fn all_passed(&self) -> bool {
        self.passed == self.pages
    }
}

/// Convert independent pages in parallel, at most `concurrency` at a time.
///
/// Results come back in input order. A failing page never affects others.
#[instrument(skip_all, fields(pages = inputs.len(), concurrency))]
pub async fn convert_batch(
    inputs: Vec<PageInput>,
    config: Arc<PipelineConfig>,
    images: Arc<dyn ImageResolver>,
    concurrency: usize,
    progress: Arc<dyn ProgressReporter>,
) -> Vec<Result<PageConversion>> {
    let start = Instant::now();
    let total = inputs.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(total);
    for (index, input) in inputs.into_iter().enumerate() {
        let sem = semaphore.clone();
        let config = config.clone();
        let images = images.clone();
        let progress = progress.clone();
        let completed = completed.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| Sn2nError::Conversion(format!("worker pool closed: {e}")))?;
            let label = input
                .source_url
                .as_ref()
                .map_or_else(|| format!("page {}", index + 1), Url::to_string);

            let result = tokio::task::spawn_blocking(move || {
                convert_page(&input, &config, images.as_ref())
            })
            .await
            .map_err(|e| Sn2nError::Conversion(format!("{label}: worker failed: {e}")))
            .and_then(|r| r);

            let done = completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            progress.page_converted(&label, done, total);
            result
        }));
    }

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        let result = handle
            .await
            .map_err(|e| Sn2nError::Conversion(format!("task join failed: {e}")))
            .and_then(|r| r);
        results.push(result);
    }

    let summary = BatchSummary::from_results(&results, start.elapsed());
    info!(
        pages = summary.pages,
        passed = summary.passed,
        failed_audit = summary.failed_audit,
        errors = summary.errors,
        elapsed_ms = summary.elapsed.as_millis(),
        "batch conversion complete"
    );
    progress.done(&summary);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use sn2n_blocks::NoImages;

    use crate::markers::reattach;

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn simple_paragraph_end_to_end() {
        let page = convert_page(
            &PageInput::new("<p>Hello <b>world</b></p>"),
            &config(),
            &UrlImageResolver::default(),
        )
        .unwrap();
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].runs.len(), 2);
        assert!(page.passed());
        assert_eq!(page.audit.coverage, 1.0);
        assert!(page.deferred.is_empty());
        assert!(page.recommendations.is_empty());
        assert_eq!(page.source_hash.len(), 64);
    }

    #[test]
    fn fixture_page_defers_nested_table() {
        let html = fixture("html/servicenow_task.html");
        let page = convert_page(&PageInput::new(html), &config(), &UrlImageResolver::default())
            .unwrap();

        assert_eq!(page.display_title(), "Activate a plugin");
        assert!(page.passed(), "{:#?}", page.audit);
        // The table inside step 3 cannot sit at level 2 with its rows.
        assert_eq!(page.deferred.len(), 1);
        let group = page.deferred.values().next().unwrap();
        assert!(matches!(group[0].kind, BlockKind::Table { .. }));
        for block in &page.blocks {
            assert!(block.depth() <= 2);
        }
    }

    #[test]
    fn failed_audit_carries_recommendations() {
        // Unresolvable images are dropped, which the audit reports.
        let html = r#"<p>Open the form.</p><p><img src="form.png"></p>"#;
        let page = convert_page(&PageInput::new(html), &config(), &NoImages).unwrap();
        assert!(!page.passed());
        assert!(!page.recommendations.is_empty());
        assert!(page.recommendations.iter().any(|r| r.reason.contains("image")));
    }

    #[test]
    fn source_url_resolves_relative_images() {
        let html = r#"<p>Icon: <img src="../images/icon.png"></p>"#;
        let input = PageInput::new(html).with_source_url(
            Url::parse("https://docs.example.com/bundle/page/task.html").unwrap(),
        );
        let page = convert_page(&input, &config(), &UrlImageResolver::default()).unwrap();
        assert!(page.passed());
        assert_eq!(page.stats.images, 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.conversion.max_depth = 1;
        let result = convert_page(&PageInput::new("<p>x</p>"), &config, &NoImages);
        assert!(matches!(result, Err(Sn2nError::Config { .. })));
    }

    #[test]
    fn deferred_content_round_trips() {
        let html = "<ul><li>a<ul><li>b<ul><li>c</li></ul></li></ul></li></ul>";
        let page = convert_page(&PageInput::new(html), &config(), &NoImages).unwrap();
        let natural = reattach(&page.blocks, &page.deferred);
        assert_eq!(natural[0].depth(), 3);
    }

    struct Recording(Mutex<Vec<usize>>);

    impl ProgressReporter for Recording {
        fn page_converted(&self, _label: &str, current: usize, _total: usize) {
            self.0.lock().unwrap().push(current);
        }
        fn done(&self, _summary: &BatchSummary) {}
    }

    #[tokio::test]
    async fn batch_keeps_input_order() {
        let inputs: Vec<_> = (0..8)
            .map(|i| PageInput {
                title: Some(format!("Page {i}")),
                source_url: None,
                html: format!("<p>Body of page {i}</p>"),
            })
            .collect();
        let progress = Arc::new(Recording(Mutex::new(Vec::new())));
        let results = convert_batch(
            inputs,
            Arc::new(config()),
            Arc::new(UrlImageResolver::default()),
            3,
            progress.clone(),
        )
        .await;

        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            let page = result.as_ref().unwrap();
            assert_eq!(page.title.as_deref(), Some(format!("Page {i}").as_str()));
            assert_eq!(page.blocks[0].plain_text(), format!("Body of page {i}"));
        }
        let mut seen = progress.0.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, (1..=8).collect::<Vec<_>>());

        let summary = BatchSummary::from_results(&results, Duration::ZERO);
        assert!(summary.all_passed());
    }

    #[tokio::test]
    async fn invalid_config_fails_every_page_independently() {
        let mut bad = config();
        bad.audit.sample_size = 0;
        let results = convert_batch(
            vec![PageInput::new("<p>a</p>"), PageInput::new("<p>b</p>")],
            Arc::new(bad),
            Arc::new(NoImages),
            2,
            Arc::new(SilentProgress),
        )
        .await;
        assert!(results.iter().all(|r| r.is_err()));
        let summary = BatchSummary::from_results(&results, Duration::ZERO);
        assert_eq!(summary.errors, 2);
        assert!(!summary.all_passed());
    }
}
