// Remote ContentFetcher: reqwest + scraper
//
// Static HTML only; pages that need JavaScript yield little text and are
// rejected downstream as too short.

use async_trait::async_trait;
use quillforge_core::port::{ContentFetcher, FetchError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; QuillforgeFetcher/0.1)";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Preferred content containers, most specific first
const MAIN_SELECTORS: [&str; 8] = [
    "article",
    "main",
    "[role='main']",
    "#content",
    "#main",
    ".post-content",
    ".entry-content",
    ".content",
];

/// Text inside these elements is never part of the readable content
const SKIPPED_ELEMENTS: [&str; 10] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "svg", "iframe",
];

/// Fetches a page and returns its readable text
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.5"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

/// Only absolute http(s) urls are fetched
fn validate_url(url: &str) -> Result<reqwest::Url, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// Readable text of an HTML document: the main container if one exists,
/// otherwise the body, without navigation, scripts and other boilerplate
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = MAIN_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|selector| document.select(&selector).next())
        });

    match root {
        Some(root) => collect_text(root),
        None => normalize_whitespace(&document.root_element().text().collect::<Vec<_>>().join(" ")),
    }
}

fn collect_text(root: ElementRef<'_>) -> String {
    let mut chunks: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !skipped {
            chunks.push(text);
        }
    }
    normalize_whitespace(&chunks.join(" "))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = validate_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        let is_html = content_type.contains("html");
        if !is_html && !content_type.starts_with("text/plain") {
            return Err(FetchError::UnsupportedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let text = if is_html {
            extract_readable_text(&body)
        } else {
            normalize_whitespace(&body)
        };
        debug!(url = %url, chars = text.chars().count(), "Fetched source page");
        Ok(text)
    }
}
