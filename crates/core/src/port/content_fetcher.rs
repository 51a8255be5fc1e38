// Remote Content Fetcher Port (source-batch only)

use async_trait::async_trait;
use thiserror::Error;

/// Fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Request failed for {url}: {message}")]
    Request { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type '{content_type}' for {url}")]
    UnsupportedContent { url: String, content_type: String },

    #[error("Content too short for {url}: {chars} chars (minimum {min})")]
    TooShort { url: String, chars: usize, min: usize },
}

/// Fetches a remote page and returns its readable plain text
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed pages; unknown urls answer 404
    #[derive(Default)]
    pub struct MockContentFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MockContentFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
            self.pages.insert(url.into(), text.into());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentFetcher for MockContentFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}
