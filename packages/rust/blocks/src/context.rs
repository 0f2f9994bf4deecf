//! Per-invocation conversion state.

use serde::{Deserialize, Serialize};
use url::Url;

use sn2n_shared::{ContentBlock, ConversionConfig};

use crate::images::ImageResolver;
use crate::placeholder::Placeholders;

/// Counters describing what one conversion did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Top-level blocks produced.
    pub blocks: usize,
    /// Bracket tokens protected from the HTML parser.
    pub protected_tokens: usize,
    /// Menu cascades collapsed into one label path.
    pub menu_cascades: usize,
    /// Images emitted as image blocks.
    pub images: usize,
    /// Images the resolver refused.
    pub unresolved_images: usize,
    /// Images moved out of table cells.
    pub cell_images: usize,
    /// Blocks flagged for deferred attachment.
    pub deferred_hints: usize,
}

/// State threaded through one conversion. Never shared between pages.
pub(crate) struct ConvertContext<'c> {
    pub config: &'c ConversionConfig,
    pub images: &'c dyn ImageResolver,
    pub placeholders: &'c Placeholders,
    /// Non-zero while converting table-cell content.
    pub cell_depth: usize,
    /// Images pulled out of cells of the table being converted.
    pub cell_images: Vec<ContentBlock>,
    pub stats: ConversionStats,
}

impl<'c> ConvertContext<'c> {
    pub fn new(
        config: &'c ConversionConfig,
        images: &'c dyn ImageResolver,
        placeholders: &'c Placeholders,
    ) -> Self {
        Self {
            config,
            images,
            placeholders,
            cell_depth: 0,
            cell_images: Vec::new(),
            stats: ConversionStats::default(),
        }
    }

    pub fn in_cell(&self) -> bool {
        self.cell_depth > 0
    }

    pub fn base_url(&self) -> Option<&'c Url> {
        self.config.base_url.as_ref()
    }

    /// Resolve a link `href` to an absolute URL. Fragment-only and script
    /// links carry no target and are dropped.
    pub fn resolve_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        if href.to_ascii_lowercase().starts_with("javascript:") {
            return None;
        }
        match Url::parse(href) {
            Ok(url) => Some(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url()
                .and_then(|base| base.join(href).ok())
                .map(|url| url.to_string()),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::NoImages;

    #[test]
    fn links_resolve_against_base() {
        let mut config = ConversionConfig::default();
        config.base_url = Some(Url::parse("https://docs.example.com/bundle/a/page.html").unwrap());
        let placeholders = Placeholders::default();
        let ctx = ConvertContext::new(&config, &NoImages, &placeholders);

        assert_eq!(
            ctx.resolve_link("other.html"),
            Some("https://docs.example.com/bundle/a/other.html".to_string())
        );
        assert_eq!(
            ctx.resolve_link("https://www.servicenow.com/"),
            Some("https://www.servicenow.com/".to_string())
        );
        assert_eq!(ctx.resolve_link("#section"), None);
        assert_eq!(ctx.resolve_link("javascript:void(0)"), None);
    }

    #[test]
    fn relative_link_without_base_is_dropped() {
        let config = ConversionConfig::default();
        let placeholders = Placeholders::default();
        let ctx = ConvertContext::new(&config, &NoImages, &placeholders);
        assert_eq!(ctx.resolve_link("other.html"), None);
    }
}
