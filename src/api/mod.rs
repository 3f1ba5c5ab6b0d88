//! HTTP client for the scrape and summarizer backend.

mod client;
mod types;

pub use client::{ApiClient, ApiError};
pub use types::{RawArticle, RawIssue, ScrapeResponse, ScrapeStats};
