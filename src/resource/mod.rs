//! Navigable image sets, local or remote.
//!
//! Both kinds implement [`ImageResource`]: a fixed list of items and a cursor
//! that wraps at either end. Local items are files and always ready. Remote
//! items are image URLs that resolve to cache files once downloaded; until
//! then navigation returns `None` and the path is delivered later through
//! [`ImageResource::on_completion`].

mod cursor;
mod local;
mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;
use url::Url;

pub use local::{LocalImageSet, open_local};
pub use remote::{RemoteImageSet, open_remote, open_remote_with};

use crate::config::DownloadConfig;
use crate::fetch::FetchError;
use crate::registry::{CompletionEvent, CompletionNotifier, JobStatus, RegistryError};
use crate::scrape::{IndeterminateReason, ScrapeError};

/// An ordered, navigable set of images.
pub trait ImageResource: Send {
    /// What was opened: a path or a page URL.
    fn target(&self) -> &str;

    /// The item under the cursor, if it is ready.
    fn current(&self) -> Option<PathBuf>;

    /// Steps back (wrapping) and returns the new item, if ready.
    fn prev(&mut self) -> Option<PathBuf>;

    /// Steps forward (wrapping) and returns the new item, if ready.
    fn next(&mut self) -> Option<PathBuf>;

    /// Number of items.
    fn len(&self) -> usize;

    /// Returns true if the set has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor position; 0 for an empty set.
    fn index(&self) -> usize;

    /// Identifier under the cursor: a file path or an image URL.
    fn current_id(&self) -> Option<String>;

    /// Download status of the item under the cursor; `None` for items that
    /// need no download.
    fn current_status(&self) -> Option<JobStatus> {
        None
    }

    /// Feeds a download completion back in.
    ///
    /// Returns the new path only if the event is for the item currently under
    /// the cursor. Sets without downloads ignore events.
    fn on_completion(&mut self, _event: &CompletionEvent) -> Option<PathBuf> {
        None
    }
}

/// Errors raised while opening an image set.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The local path does not exist.
    #[error("{path} not found")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The page's images could not be determined without a browser render.
    #[error(
        "cannot determine images on {url}: {reason}\n  Suggestion: the page may build its gallery with scripts, which is not supported"
    )]
    ScrapeIndeterminate {
        /// The page URL.
        url: String,
        /// What the scraper observed.
        reason: IndeterminateReason,
    },

    /// Scraping failed for another reason.
    #[error(transparent)]
    Scrape(ScrapeError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The download registry could not be created.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A local directory could not be listed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ResourceError {
    /// Creates a not-found error.
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<ScrapeError> for ResourceError {
    fn from(error: ScrapeError) -> Self {
        match error {
            ScrapeError::Indeterminate { url, reason } => Self::ScrapeIndeterminate { url, reason },
            ScrapeError::Fetch(source) => Self::Fetch(source),
            other => Self::Scrape(other),
        }
    }
}

/// Returns true if `target` names a web page rather than a local path.
#[must_use]
pub fn is_remote_target(target: &str) -> bool {
    Url::parse(target).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Opens `target` as a remote set when it is an http(s) URL, else as a local one.
///
/// # Errors
///
/// See [`open_local`] and [`open_remote`].
#[instrument(skip(config, notifier))]
pub async fn open(
    target: &str,
    config: &DownloadConfig,
    notifier: Arc<dyn CompletionNotifier>,
) -> Result<Box<dyn ImageResource>, ResourceError> {
    if is_remote_target(target) {
        Ok(Box::new(open_remote(target, config, notifier).await?))
    } else {
        Ok(Box::new(open_local(target)?))
    }
}
