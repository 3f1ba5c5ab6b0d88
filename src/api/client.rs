use chrono::NaiveDate;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{ContentRequest, ContentResponse, ScrapeRequest, ScrapeResponse};
use crate::model::{ContentKind, Effort};
use crate::util::{validate_article_url, UrlValidationError};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid article URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Transient errors worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::HttpStatus(status) => *status >= 500,
            ApiError::Backend(_)
            | ApiError::ResponseTooLarge(_)
            | ApiError::InvalidUrl(_)
            | ApiError::Json(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e)
        }
    }
}

/// Client for the scrape and summarizer endpoints.
///
/// Request timeouts come from the supplied `reqwest::Client`.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    retry_delay: Duration,
}

impl ApiClient {
    /// `base_url` must end with `/` (see [`crate::util::parse_base_url`]).
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Base delay for retries; doubles on each attempt.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /api/scrape` for an inclusive date range.
    pub async fn scrape(&self, start: NaiveDate, end: NaiveDate) -> Result<ScrapeResponse, ApiError> {
        let request = ScrapeRequest {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
        };
        tracing::info!(start = %request.start_date, end = %request.end_date, "Requesting scrape");

        let response: ScrapeResponse = self.post_with_retry("api/scrape", &request).await?;
        if !response.success {
            return Err(ApiError::Backend(
                response
                    .error
                    .unwrap_or_else(|| "scrape failed".to_string()),
            ));
        }

        tracing::debug!(
            articles = response.articles.len(),
            issues = response.issues.len(),
            "Scrape complete"
        );
        Ok(response)
    }

    pub async fn summarize_url(&self, url: &str, effort: Effort) -> Result<String, ApiError> {
        self.fetch_content(url, ContentKind::Summary, effort).await
    }

    pub async fn tldr_url(&self, url: &str, effort: Effort) -> Result<String, ApiError> {
        self.fetch_content(url, ContentKind::Tldr, effort).await
    }

    /// Fetch generated markdown for an article.
    pub async fn fetch_content(
        &self,
        url: &str,
        kind: ContentKind,
        effort: Effort,
    ) -> Result<String, ApiError> {
        let article_url = validate_article_url(url)?;
        let path = match kind {
            ContentKind::Summary => "api/summarize-url",
            ContentKind::Tldr => "api/tldr-url",
        };
        let request = ContentRequest {
            url: article_url.as_str(),
            summary_effort: effort.as_str(),
        };

        let response: ContentResponse = self.post_with_retry(path, &request).await?;
        if !response.success {
            return Err(ApiError::Backend(
                response
                    .error
                    .unwrap_or_else(|| format!("{kind} request failed")),
            ));
        }

        let markdown = match kind {
            ContentKind::Summary => response.summary_markdown,
            ContentKind::Tldr => response.tldr_markdown,
        };
        markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ApiError::Backend(format!("{kind} response was empty")))
    }

    /// POST with exponential backoff on transient failures.
    async fn post_with_retry<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut retry_count = 0;
        loop {
            match self.post_once(path, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_delay * (1u32 << retry_count);
                    tracing::debug!(
                        error = %e,
                        path,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, path, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn post_once<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Backend(format!("bad endpoint {path}: {e}")))?;

        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Read a response body, refusing anything larger than `limit`.
async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
