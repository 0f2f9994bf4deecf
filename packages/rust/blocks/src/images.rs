//! Image resolution seam.
//!
//! The converter never fetches anything. It asks an [`ImageResolver`] for a
//! reference the target can display, and treats `None` as "use a placeholder".

use url::Url;

use sn2n_shared::ImageSource;

/// Turns an image `src` found in the page into something the target accepts.
pub trait ImageResolver: Send + Sync {
    /// Resolve `src` (possibly relative to `base`). `None` means the image
    /// cannot be used and a placeholder should take its place.
    fn resolve(&self, src: &str, base: Option<&Url>) -> Option<ImageSource>;
}

/// Default resolver: absolute `http(s)` URLs become external images.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlImageResolver {
    /// Accept `data:` URLs as external images.
    pub allow_data_urls: bool,
}

impl UrlImageResolver {
    pub fn new(allow_data_urls: bool) -> Self {
        Self { allow_data_urls }
    }
}

impl ImageResolver for UrlImageResolver {
    fn resolve(&self, src: &str, base: Option<&Url>) -> Option<ImageSource> {
        let src = src.trim();
        if src.is_empty() {
            return None;
        }
        if src.starts_with("data:") {
            return self.allow_data_urls.then(|| ImageSource::External {
                url: src.to_string(),
            });
        }
        let url = match Url::parse(src) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(src).ok()?,
            Err(_) => return None,
        };
        matches!(url.scheme(), "http" | "https").then(|| ImageSource::External {
            url: url.to_string(),
        })
    }
}

/// Resolver that refuses every image. Useful for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImages;

impl ImageResolver for NoImages {
    fn resolve(&self, _src: &str, _base: Option<&Url>) -> Option<ImageSource> {
        None
    }
}
