//! HTTP client wrapper for page and image fetches.
//!
//! This module provides the `HttpClient` struct which issues single GET
//! requests with the configured proxy mapping, validates the response status,
//! and either decodes the body as text or streams it to a file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Proxy, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, WRITE_CHUNK_SIZE};
use super::error::FetchError;
use crate::user_agent;

/// Per-scheme proxy mapping.
///
/// `http` is used for `http://` requests and `https` for `https://` requests.
/// A missing or blank entry means that scheme goes direct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL for plain HTTP requests.
    #[serde(default)]
    pub http: Option<String>,
    /// Proxy URL for HTTPS requests.
    #[serde(default)]
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Creates a mapping that sends both schemes through the same proxy.
    #[must_use]
    pub fn all(proxy_url: impl Into<String>) -> Self {
        let proxy_url = proxy_url.into();
        Self {
            http: Some(proxy_url.clone()),
            https: Some(proxy_url),
        }
    }

    /// Returns true when neither scheme has a usable proxy URL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        non_blank(self.http.as_deref()).is_none() && non_blank(self.https.as_deref()).is_none()
    }
}

/// Construction options for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Proxy mapping, `None` for direct connections.
    pub proxy: Option<ProxyConfig>,
    /// User-Agent override; the browser default is used when `None`.
    pub user_agent: Option<String>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl ClientOptions {
    /// Options using the given proxy mapping and default timeouts.
    #[must_use]
    pub fn with_proxy(proxy: Option<ProxyConfig>) -> Self {
        Self {
            proxy,
            ..Self::default()
        }
    }
}

/// The seam the download registry and the page scraper fetch through.
///
/// [`HttpClient`] is the production implementation; tests substitute
/// counting or failing fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its body decoded as UTF-8.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches `url` and writes its body to `dest`, returning bytes written.
    ///
    /// `dest` is created or truncated; a partially written file may remain
    /// when this fails.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// HTTP client for page and image fetches.
///
/// Created once per opened resource and shared (cheaply cloned) by all
/// download tasks so connections are pooled.
///
/// Certificate verification is disabled: image hosts with self-signed or
/// expired certificates must still be viewable.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts and the given proxy mapping.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if a proxy URL is invalid or the
    /// TLS backend cannot be initialized.
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, FetchError> {
        Self::with_options(&ClientOptions::with_proxy(proxy.cloned()))
    }

    /// Creates a client from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if a proxy URL is invalid or the
    /// TLS backend cannot be initialized.
    #[instrument(level = "debug", skip(options), fields(proxied = options.proxy.is_some()))]
    pub fn with_options(options: &ClientOptions) -> Result<Self, FetchError> {
        let builder = base_client_builder(options);
        let builder = apply_proxy(builder, options.proxy.as_ref())?;
        warn!("TLS certificate verification is disabled for image and page fetches");
        let client = builder
            .build()
            .map_err(|e| FetchError::client_build(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetches a page and returns its body as text.
    ///
    /// The body is always decoded as UTF-8 (invalid sequences are replaced),
    /// whatever charset the server declares.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] on network failure and
    /// [`FetchError::BadStatus`] when the status is not 200.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.send_get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        debug!(bytes = bytes.len(), "page fetched");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetches `url` and streams its body into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`], [`FetchError::BadStatus`] or
    /// [`FetchError::Io`].
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    pub async fn download_to_path(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.send_get(url).await?;

        let mut file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        let bytes = stream_to_file(&mut file, response, url, dest).await?;

        debug!(bytes, "body written");
        Ok(bytes)
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::bad_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.download_to_path(url, dest).await
    }
}

/// Streams a response body to `file` in [`WRITE_CHUNK_SIZE`] writes.
///
/// Takes the response by value; it is dropped (and its connection released)
/// on every return path.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, FetchError> {
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::transport(url, e))?;
        for piece in chunk.chunks(WRITE_CHUNK_SIZE) {
            file.write_all(piece)
                .await
                .map_err(|e| FetchError::io(path, e))?;
            bytes_written += piece.len() as u64;
        }
    }

    file.flush().await.map_err(|e| FetchError::io(path, e))?;
    Ok(bytes_written)
}

fn base_client_builder(options: &ClientOptions) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
        .timeout(Duration::from_secs(options.read_timeout_secs))
        .gzip(true)
        .danger_accept_invalid_certs(true)
        .user_agent(user_agent::effective_user_agent(options.user_agent.as_deref()))
}

fn apply_proxy(
    builder: ClientBuilder,
    proxy: Option<&ProxyConfig>,
) -> Result<ClientBuilder, FetchError> {
    // Without a mapping we go direct, ignoring HTTP(S)_PROXY from the environment.
    let mut builder = builder.no_proxy();
    let Some(proxy) = proxy else {
        return Ok(builder);
    };

    if let Some(http) = non_blank(proxy.http.as_deref()) {
        let resolved = Proxy::http(http)
            .map_err(|e| FetchError::client_build(format!("invalid http proxy {http}: {e}")))?;
        builder = builder.proxy(resolved);
    }
    if let Some(https) = non_blank(proxy.https.as_deref()) {
        let resolved = Proxy::https(https)
            .map_err(|e| FetchError::client_build(format!("invalid https proxy {https}: {e}")))?;
        builder = builder.proxy(resolved);
    }
    Ok(builder)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_proxy_config_all_sets_both_schemes() {
        let proxy = ProxyConfig::all("http://127.0.0.1:8001");
        assert_eq!(proxy.http.as_deref(), Some("http://127.0.0.1:8001"));
        assert_eq!(proxy.https.as_deref(), Some("http://127.0.0.1:8001"));
        assert!(!proxy.is_empty());
    }

    #[test]
    fn test_proxy_config_blank_entries_are_empty() {
        let proxy = ProxyConfig {
            http: Some("  ".to_string()),
            https: None,
        };
        assert!(proxy.is_empty());
    }

    #[test]
    fn test_client_builds_without_proxy() {
        assert!(HttpClient::new(None).is_ok());
    }

    #[test]
    fn test_client_builds_with_proxy_mapping() {
        let proxy = ProxyConfig::all("http://127.0.0.1:8001");
        assert!(HttpClient::new(Some(&proxy)).is_ok());
    }

    #[tokio::test]
    async fn test_http_requests_go_through_http_proxy() {
        let Some(proxy_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/p.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via-proxy"))
            .expect(1)
            .mount(&proxy_server)
            .await;

        let proxy = ProxyConfig {
            http: Some(proxy_server.uri()),
            https: None,
        };
        let client = HttpClient::new(Some(&proxy)).unwrap();
        let body = client
            .get_text("http://nonexistent.invalid/p.html")
            .await
            .unwrap();

        assert_eq!(body, "via-proxy");
    }

    #[tokio::test]
    async fn test_get_text_rejects_invalid_url() {
        let client = HttpClient::new(None).unwrap();
        let result = client.get_text("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_text_decodes_invalid_utf8_lossily() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=iso-8859-1")
                    .set_body_bytes(b"<p>caf\xe9</p>".to_vec()),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let text = client
            .get_text(&format!("{}/page.html", server.uri()))
            .await
            .unwrap();
        assert!(text.starts_with("<p>caf"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_bad_status() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let err = client
            .get_text(&format!("{}/empty", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(204));
    }

    #[tokio::test]
    async fn test_download_to_path_sends_browser_user_agent() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("x.png");
        let client = HttpClient::new(None).unwrap();
        let written = client
            .download_to_path(&format!("{}/x.png", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 4096]);

        let requests = server.received_requests().await.unwrap();
        let sent_ua = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(sent_ua, user_agent::DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn test_download_to_path_truncates_existing_file() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/small.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("small.jpg");
        std::fs::write(&dest, b"previous partial content").unwrap();

        let client = HttpClient::new(None).unwrap();
        client
            .download_to_path(&format!("{}/small.jpg", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_user_agent_override_is_sent() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .and(header("user-agent", "custom-agent/2.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let options = ClientOptions {
            user_agent: Some("custom-agent/2.0".to_string()),
            ..ClientOptions::default()
        };
        let client = HttpClient::with_options(&options).unwrap();
        let text = client
            .get_text(&format!("{}/page.html", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }
}
