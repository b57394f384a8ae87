//! Image sets scraped from a web page and downloaded on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use super::cursor::Cursor;
use super::{ImageResource, ResourceError};
use crate::config::DownloadConfig;
use crate::fetch::{Fetcher, HttpClient};
use crate::registry::{
    CompletionEvent, CompletionNotifier, DownloadRegistry, JobStatus, RegistryOptions,
};
use crate::scrape::UrlScraper;

/// The images of one web page.
///
/// Items are image URLs. Asking for an item that is not cached yet starts its
/// download and returns `None`; the path arrives later through
/// [`ImageResource::on_completion`].
#[derive(Debug)]
pub struct RemoteImageSet {
    page_url: String,
    urls: Vec<String>,
    cursor: Cursor,
    registry: DownloadRegistry,
    ready: HashMap<String, PathBuf>,
}

impl RemoteImageSet {
    /// Wraps an already scraped URL list.
    #[must_use]
    pub fn new(page_url: impl Into<String>, urls: Vec<String>, registry: DownloadRegistry) -> Self {
        Self {
            page_url: page_url.into(),
            cursor: Cursor::new(urls.len(), 0),
            urls,
            registry,
            ready: HashMap::new(),
        }
    }

    /// Image URLs in navigation order.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// The registry downloading this set's images.
    #[must_use]
    pub fn registry(&self) -> &DownloadRegistry {
        &self.registry
    }

    /// This session's cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.registry.cache_dir()
    }

    /// Returns the local file for `url` if it is ready, otherwise starts (or
    /// keeps waiting on) its download and returns `None`.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        if let Some(path) = self.ready.get(url) {
            return Some(path.clone());
        }
        if let Some(path) = self.registry.path_for(url) {
            return Some(path);
        }
        let status = self.registry.ensure(url);
        trace!(%status, "image not ready");
        None
    }

    fn resolve_at(&self, index: Option<usize>) -> Option<PathBuf> {
        let url = index.and_then(|i| self.urls.get(i))?;
        self.resolve(url)
    }
}

impl ImageResource for RemoteImageSet {
    fn target(&self) -> &str {
        &self.page_url
    }

    fn current(&self) -> Option<PathBuf> {
        self.resolve_at(self.cursor.get())
    }

    fn prev(&mut self) -> Option<PathBuf> {
        let index = self.cursor.retreat();
        self.resolve_at(index)
    }

    fn next(&mut self) -> Option<PathBuf> {
        let index = self.cursor.advance();
        self.resolve_at(index)
    }

    fn len(&self) -> usize {
        self.cursor.len()
    }

    fn index(&self) -> usize {
        self.cursor.position()
    }

    fn current_id(&self) -> Option<String> {
        self.cursor
            .get()
            .and_then(|i| self.urls.get(i))
            .cloned()
    }

    fn current_status(&self) -> Option<JobStatus> {
        let url = self.cursor.get().and_then(|i| self.urls.get(i))?;
        if self.ready.contains_key(url) {
            return Some(JobStatus::Completed);
        }
        self.registry.status(url)
    }

    fn on_completion(&mut self, event: &CompletionEvent) -> Option<PathBuf> {
        let path = event.save_path()?;
        if !self.urls.contains(&event.url) {
            debug!(url = %event.url, "completion for a URL outside this set");
            return None;
        }
        self.ready.insert(event.url.clone(), path.to_path_buf());

        let current = self.cursor.get().and_then(|i| self.urls.get(i));
        if current == Some(&event.url) {
            Some(path.to_path_buf())
        } else {
            trace!(url = %event.url, "stale completion, cursor moved on");
            None
        }
    }
}

/// Scrapes `page_url` and prepares a set downloading into a fresh cache
/// directory under `config.cache_root`.
///
/// # Errors
///
/// - [`ResourceError::ScrapeIndeterminate`] when the page yields no images
/// - [`ResourceError::Scrape`] or [`ResourceError::Fetch`] when the page
///   cannot be fetched or parsed
/// - [`ResourceError::Registry`] when the cache directory cannot be created
pub async fn open_remote(
    page_url: &str,
    config: &DownloadConfig,
    notifier: Arc<dyn CompletionNotifier>,
) -> Result<RemoteImageSet, ResourceError> {
    let client = HttpClient::new(config.proxy.as_ref())?;
    open_remote_with(page_url, config, Arc::new(client), notifier).await
}

/// Like [`open_remote`] with a caller-supplied fetcher for both the page and
/// the images.
///
/// # Errors
///
/// See [`open_remote`].
#[instrument(skip(config, fetcher, notifier), fields(cache_root = %config.cache_root.display()))]
pub async fn open_remote_with(
    page_url: &str,
    config: &DownloadConfig,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn CompletionNotifier>,
) -> Result<RemoteImageSet, ResourceError> {
    let urls = UrlScraper::default()
        .scrape_page(fetcher.as_ref(), page_url)
        .await?;

    let cache_dir = config.cache_root.join(Uuid::new_v4().to_string());
    let registry = DownloadRegistry::new(
        &cache_dir,
        fetcher,
        notifier,
        RegistryOptions::from_config(config),
    )?;

    info!(
        url = %page_url,
        images = urls.len(),
        cache_dir = %cache_dir.display(),
        "opened remote image set"
    );
    Ok(RemoteImageSet::new(page_url, urls, registry))
}
