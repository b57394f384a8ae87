//! Integration tests for page scraping over HTTP.

mod support;

use imgview_core::fetch::HttpClient;
use imgview_core::scrape::{IndeterminateReason, ScrapeError, UrlScraper};
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_scrape_page_resolves_against_served_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let html = r#"
        <html>
          <head><link rel="icon" href="/favicon.png"></head>
          <body>
            <img src="photos/b.jpg">
            <a href="photos/full/a.JPEG"><img src="photos/a.jpg"></a>
            <img src="https://cdn.example.net/z.png">
            <script src="app.js"></script>
          </body>
        </html>"#;
    Mock::given(method("GET"))
        .and(path("/gallery/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let client = HttpClient::new(None).unwrap();
    let page = format!("{}/gallery/page.html", server.uri());
    let urls = UrlScraper::default()
        .scrape_page(&client, &page)
        .await
        .unwrap();

    let base = server.uri();
    let mut expected = vec![
        format!("{base}/favicon.png"),
        format!("{base}/gallery/photos/a.jpg"),
        format!("{base}/gallery/photos/b.jpg"),
        format!("{base}/gallery/photos/full/a.JPEG"),
        "https://cdn.example.net/z.png".to_string(),
    ];
    expected.sort();
    assert_eq!(urls, expected);
}

#[tokio::test]
async fn test_scrape_page_decodes_invalid_utf8_lossily() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut body = b"<p>caf\xe9</p><img src=\"x.png\">".to_vec();
    body.extend_from_slice(b"<!-- \xff\xfe -->");
    Mock::given(method("GET"))
        .and(path("/latin1.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=iso-8859-1")
                .set_body_bytes(body),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(None).unwrap();
    let page = format!("{}/latin1.html", server.uri());
    let urls = UrlScraper::default()
        .scrape_page(&client, &page)
        .await
        .unwrap();
    assert_eq!(urls, vec![format!("{}/x.png", server.uri())]);
}

#[tokio::test]
async fn test_scrape_empty_body_is_indeterminate() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/blank.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("   \n"))
        .mount(&server)
        .await;

    let client = HttpClient::new(None).unwrap();
    let page = format!("{}/blank.html", server.uri());
    let err = UrlScraper::default()
        .scrape_page(&client, &page)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Indeterminate {
            reason: IndeterminateReason::EmptyDocument,
            ..
        }
    ));
}

#[tokio::test]
async fn test_scrape_non_200_is_fetch_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/moved.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HttpClient::new(None).unwrap();
    let page = format!("{}/moved.html", server.uri());
    let err = UrlScraper::default()
        .scrape_page(&client, &page)
        .await
        .unwrap_err();

    match err {
        ScrapeError::Fetch(fetch) => assert_eq!(fetch.status(), Some(404)),
        other => panic!("expected fetch error, got {other:?}"),
    }
}
