//! HTTP fetcher for web pages and image files.
//!
//! Every request is a single GET that:
//!
//! - identifies as a desktop browser (overridable per client)
//! - honors the configured per-scheme proxy mapping, or goes direct
//! - skips TLS certificate verification
//! - accepts only HTTP 200
//!
//! Page bodies are returned as UTF-8 text; image bodies are streamed to disk.
//! Retrying is the caller's job (see [`crate::registry`]).
//!
//! # Example
//!
//! ```no_run
//! use imgview_core::fetch::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(None)?;
//! let html = client.get_text("https://example.com/gallery.html").await?;
//! let bytes = client
//!     .download_to_path("https://example.com/a.png", Path::new("./cache/a.png"))
//!     .await?;
//! println!("{} chars of html, {bytes} bytes of image", html.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;

pub use client::{ClientOptions, Fetcher, HttpClient, ProxyConfig};
pub use error::FetchError;
