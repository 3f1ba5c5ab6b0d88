//! Utility functions for common operations.
//!
//! - **Dates**: normalizing scraped date strings and enumerating date ranges
//! - **URL validation**: article links and the backend base URL
//!
//! # Examples
//!
//! ```
//! use tldr_sync::util::{date_range, normalize_iso_date};
//!
//! let start = normalize_iso_date("2024-08-01T09:00:00Z").unwrap();
//! let end = normalize_iso_date("2024-08-03").unwrap();
//! assert_eq!(date_range(start, end).len(), 3);
//! ```

mod date;
mod url_validator;

pub use date::{date_range, normalize_iso_date, MAX_RANGE_DAYS};
pub use url_validator::{parse_base_url, validate_article_url, UrlValidationError};
