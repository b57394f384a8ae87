//! Error types for page scraping.

use std::fmt;

use thiserror::Error;

use crate::fetch::FetchError;

/// Why a page could not be confidently turned into an image list.
///
/// Both reasons mean the same thing to callers: a richer rendering strategy
/// (running the page in a browser) would be needed, and none is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndeterminateReason {
    /// The body parsed to no document structure at all.
    EmptyDocument,
    /// The document parsed but no attribute value looked like an image URL.
    NoImages,
}

impl fmt::Display for IndeterminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDocument => f.write_str("page has no document structure"),
            Self::NoImages => f.write_str("no image URLs found in page"),
        }
    }
}

/// Errors that can occur while scraping a page for image URLs.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The page needs a full browser render to reveal its images (unsupported).
    #[error(
        "cannot determine images on {url}: {reason}\n  Suggestion: the page may build its gallery with scripts, which is not supported"
    )]
    Indeterminate {
        /// The page URL.
        url: String,
        /// What the scraper observed.
        reason: IndeterminateReason,
    },

    /// The page URL itself could not be parsed, so relative links cannot be resolved.
    #[error("invalid page URL: {url}")]
    InvalidPageUrl {
        /// The page URL as given.
        url: String,
    },

    /// Fetching the page failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ScrapeError {
    /// Creates an indeterminate-result error.
    pub fn indeterminate(url: impl Into<String>, reason: IndeterminateReason) -> Self {
        Self::Indeterminate {
            url: url.into(),
            reason,
        }
    }

    /// Creates an invalid page URL error.
    pub fn invalid_page_url(url: impl Into<String>) -> Self {
        Self::InvalidPageUrl { url: url.into() }
    }

    /// Returns true for the "needs richer rendering" signal, whatever its reason.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }
}
