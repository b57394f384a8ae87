//! Error types for the download registry.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;

/// A download that ended in the `Failed` state.
///
/// `source` is the error from the last attempt. `attempts` is zero when no
/// attempt was made because no cache file name could be derived from the URL.
#[derive(Debug, Error)]
#[error("download failed after {attempts} attempt(s): {url}")]
pub struct DownloadFailed {
    /// The image URL.
    pub url: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The last attempt's error.
    #[source]
    pub source: FetchError,
}

impl DownloadFailed {
    /// Wraps the last attempt's error.
    pub fn exhausted(url: impl Into<String>, attempts: u32, source: FetchError) -> Self {
        Self {
            url: url.into(),
            attempts,
            source,
        }
    }

    /// Failure for a URL whose final path segment cannot name a file.
    pub fn no_file_name(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            source: FetchError::invalid_url(&url),
            url,
            attempts: 0,
        }
    }
}

/// Errors raised while constructing a [`DownloadRegistry`](super::DownloadRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Worker count outside the accepted range.
    #[error("invalid worker count {value}: must be between {min} and {max}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// No tokio runtime is available to run download tasks.
    #[error("download registry must be created inside a tokio runtime")]
    NoRuntime,

    /// The cache directory could not be created.
    #[error("cannot create cache directory {path}: {source}")]
    Io {
        /// The cache directory.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// Creates a cache directory error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
