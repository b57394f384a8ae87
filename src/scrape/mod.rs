//! Image URL scraping from web pages.
//!
//! A page is fetched once, parsed with [`scraper`], and every attribute value
//! of every element whose last dot-segment is an image extension becomes a
//! candidate. Candidates are resolved against the page URL, deduplicated and
//! sorted, so the same page always yields the same sequence.
//!
//! A blank page, or one with no candidates, yields
//! [`ScrapeError::Indeterminate`] rather than an empty list: such pages
//! usually build their galleries with scripts, which would need a browser.
//!
//! # Example
//!
//! ```
//! use imgview_core::scrape::extract_image_urls;
//!
//! let urls = extract_image_urls("http://h/p/page.html", r#"<img src="x.png">"#).unwrap();
//! assert_eq!(urls, vec!["http://h/p/x.png".to_string()]);
//! ```

mod error;
mod extract;

pub use error::{IndeterminateReason, ScrapeError};
pub use extract::{DEFAULT_IMAGE_EXTENSIONS, ImageExtensions, UrlScraper, extract_image_urls};
