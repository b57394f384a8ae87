//! Image URL extraction from HTML documents.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::{IndeterminateReason, ScrapeError};
use crate::fetch::Fetcher;

/// Matches every element in a document.
#[allow(clippy::expect_used)]
static ANY_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("*").expect("universal selector is valid")); // Static pattern, safe to panic

/// Image file extensions recognized out of the box.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Set of lower-case file extensions treated as images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtensions {
    extensions: BTreeSet<String>,
}

impl Default for ImageExtensions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }
}

impl ImageExtensions {
    /// Adds an extension (leading dot and case are ignored).
    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        if !normalized.is_empty() {
            self.extensions.insert(normalized);
        }
        self
    }

    /// Returns true if the last dot-segment of `value` is a known image extension.
    ///
    /// A value without any dot has no extension and never matches.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        value
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    /// Iterates the known extensions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

/// Extracts image URLs from HTML pages.
#[derive(Debug, Clone, Default)]
pub struct UrlScraper {
    extensions: ImageExtensions,
}

impl UrlScraper {
    /// Creates a scraper recognizing the given extensions.
    #[must_use]
    pub fn new(extensions: ImageExtensions) -> Self {
        Self { extensions }
    }

    /// Returns the recognized extensions.
    #[must_use]
    pub fn extensions(&self) -> &ImageExtensions {
        &self.extensions
    }

    /// Extracts every image URL referenced by any attribute of any element.
    ///
    /// Relative values are resolved against `page_url`; values starting with
    /// `http` are kept verbatim. The result is deduplicated and sorted, so it
    /// does not depend on document order.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Indeterminate`] with [`IndeterminateReason::EmptyDocument`]
    ///   when `html` has no document structure
    /// - [`ScrapeError::Indeterminate`] with [`IndeterminateReason::NoImages`]
    ///   when nothing looks like an image
    /// - [`ScrapeError::InvalidPageUrl`] when `page_url` does not parse
    #[instrument(skip(self, html), fields(html_len = html.len()))]
    pub fn extract(&self, page_url: &str, html: &str) -> Result<Vec<String>, ScrapeError> {
        let base = Url::parse(page_url).map_err(|_| ScrapeError::invalid_page_url(page_url))?;

        if html.trim().is_empty() {
            debug!("empty document");
            return Err(ScrapeError::indeterminate(
                page_url,
                IndeterminateReason::EmptyDocument,
            ));
        }

        let document = Html::parse_document(html);
        let mut images = BTreeSet::new();

        for element in document.select(&ANY_ELEMENT) {
            for (name, value) in element.value().attrs() {
                let value = value.trim();
                if !self.extensions.matches(value) {
                    continue;
                }
                trace!(element = element.value().name(), attr = name, value, "image candidate");
                match resolve_candidate(&base, value) {
                    Some(resolved) => {
                        images.insert(resolved);
                    }
                    None => debug!(value, "skipping unresolvable image reference"),
                }
            }
        }

        if images.is_empty() {
            debug!("no image candidates found");
            return Err(ScrapeError::indeterminate(
                page_url,
                IndeterminateReason::NoImages,
            ));
        }

        debug!(count = images.len(), "extracted image URLs");
        Ok(images.into_iter().collect())
    }

    /// Fetches `page_url` and extracts its image URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Fetch`] when the page cannot be fetched, and the
    /// errors of [`UrlScraper::extract`] otherwise.
    #[instrument(skip(self, fetcher), fields(url = %page_url))]
    pub async fn scrape_page<F>(
        &self,
        fetcher: &F,
        page_url: &str,
    ) -> Result<Vec<String>, ScrapeError>
    where
        F: Fetcher + ?Sized,
    {
        let html = fetcher.fetch_text(page_url).await?;
        self.extract(page_url, &html)
    }
}

/// Extracts image URLs using the default extension set.
///
/// # Errors
///
/// See [`UrlScraper::extract`].
pub fn extract_image_urls(page_url: &str, html: &str) -> Result<Vec<String>, ScrapeError> {
    UrlScraper::default().extract(page_url, html)
}

/// Absolute http(s) URLs pass through; anything else is joined onto the page.
fn resolve_candidate(base: &Url, value: &str) -> Option<String> {
    let resolved = match Url::parse(value) {
        Ok(url) => url,
        Err(_) => base.join(value).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| String::from(resolved))
}
