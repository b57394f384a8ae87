//! imgview core library
//!
//! Turns a local folder or a web page into a navigable set of images. Remote
//! pages are scraped for image URLs, and each image is downloaded into a
//! per-session cache the first time the cursor reaches it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP client (proxy aware) for pages and image files
//! - [`scrape`] - Image URL extraction from HTML
//! - [`registry`] - Deduplicating download registry with bounded workers and retry
//! - [`resource`] - Local and remote image sets with a wrapping cursor
//! - [`config`] - JSON configuration store and download settings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod registry;
pub mod resource;
pub mod scrape;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, ConfigStore, DEFAULT_RETRY, DownloadConfig};
pub use fetch::{FetchError, Fetcher, HttpClient, ProxyConfig};
pub use registry::{
    CompletionEvent, CompletionNotifier, DEFAULT_WORKERS, DownloadFailed, DownloadRegistry,
    JobOutcome, JobStatus, RegistryError, RetryPolicy, completion_channel,
};
pub use resource::{
    ImageResource, LocalImageSet, RemoteImageSet, ResourceError, open, open_local, open_remote,
};
pub use scrape::{ScrapeError, UrlScraper, extract_image_urls};
pub use user_agent::DEFAULT_USER_AGENT;
