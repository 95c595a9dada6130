#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client for the paginated upstream shelter dataset.
//!
//! The upstream API is a page-numbered JSON endpoint with the row list
//! wrapped in a response envelope. The import pipeline consumes it one
//! page at a time through the [`ExternalFeedClient`] trait; tests inject
//! scripted implementations instead of HTTP.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use shelter_map_feed_models::FeedPage;

/// Errors that can occur while fetching the upstream feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The upstream answered but the response was unusable.
    #[error("feed unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

/// Fetches one page of the upstream shelter dataset at a time.
#[async_trait]
pub trait ExternalFeedClient: Send + Sync {
    /// Fetches the given 1-based page.
    ///
    /// Returns `Ok(None)` when the upstream reports no body for the page,
    /// which the importer treats as end-of-feed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the fetch or parse fails.
    async fn fetch_page(&self, page: u32) -> Result<Option<FeedPage>, FeedError>;
}

/// Response envelope the upstream wraps every page in.
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    response: Option<FeedResponse>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    body: Option<FeedPage>,
}

/// HTTP implementation of [`ExternalFeedClient`] over page-number
/// pagination.
#[derive(Debug)]
pub struct HttpFeedClient {
    client: reqwest::Client,
    base_url: String,
    page_param: String,
    size_param: String,
    page_size: u32,
    headers: BTreeMap<String, String>,
}

impl HttpFeedClient {
    /// Creates a client for the given endpoint with upstream parameter
    /// defaults (`pageNo` / `numOfRows`, 100 rows per page).
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
            page_param: "pageNo".to_owned(),
            size_param: "numOfRows".to_owned(),
            page_size: 100,
            headers: BTreeMap::new(),
        }
    }

    /// Overrides the page-number query parameter name.
    #[must_use]
    pub fn with_page_param(mut self, param: &str) -> Self {
        self.page_param = param.to_owned();
        self
    }

    /// Overrides the page-size query parameter name.
    #[must_use]
    pub fn with_size_param(mut self, param: &str) -> Self {
        self.size_param = param.to_owned();
        self
    }

    /// Sets the number of rows requested per page.
    #[must_use]
    pub const fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Adds an HTTP header to include in requests.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Parses a raw upstream response body into a page.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Json`] if the body is not valid envelope JSON.
    fn parse_body(body: &str) -> Result<Option<FeedPage>, FeedError> {
        let envelope: FeedEnvelope = serde_json::from_str(body)?;
        Ok(envelope.response.and_then(|r| r.body))
    }
}

#[async_trait]
impl ExternalFeedClient for HttpFeedClient {
    async fn fetch_page(&self, page: u32) -> Result<Option<FeedPage>, FeedError> {
        let mut request = self.client.get(&self.base_url).query(&[
            (self.page_param.as_str(), page.to_string()),
            (self.size_param.as_str(), self.page_size.to_string()),
        ]);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        log::debug!("Fetching feed page {page} from {}", self.base_url);
        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        let parsed = Self::parse_body(&body)?;

        if let Some(ref page_body) = parsed {
            log::debug!(
                "Feed page {page}: {} items (totalCount={:?}, numOfRows={:?})",
                page_body.items.len(),
                page_body.total_count,
                page_body.num_of_rows
            );
        }

        Ok(parsed)
    }
}
