//! Error types for xxkcd operations.
//!
//! This module defines the main error type [`XkcdError`] which represents
//! everything that can go wrong while coercing keys, fetching and decoding
//! upstream data, or scraping the what-if pages.
//!
//! # Example
//!
//! ```rust
//! use xxkcd_core::{KeyInput, XkcdError, coerce};
//!
//! let err = coerce(KeyInput::from("abc"), None, || Ok(10)).unwrap_err();
//! assert!(matches!(err, XkcdError::InvalidKey(_)));
//! ```

use thiserror::Error;

/// Main error type for the xkcd and what-if clients.
///
/// Transport and decoding failures are never retried by the library; they
/// surface from the accessor that triggered the fetch and leave the cached
/// field empty, so the next access starts over.
#[derive(Error, Debug)]
pub enum XkcdError {
    /// HTTP request errors from reqwest.
    ///
    /// This variant wraps network errors, DNS failures, connection issues,
    /// and other HTTP-related problems.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when an HTTP request exceeds the configured timeout duration.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The server answered with a non-success status.
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    /// The transport has nothing to serve for this URL.
    #[error("Nothing available at {url}")]
    Unavailable { url: String },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Reading a response body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON endpoint returned something that is not a comic record.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A key that is neither an integer, a numeric string nor "latest".
    #[error("Invalid key: {0:?} (expected an integer, a numeric string, or latest)")]
    InvalidKey(String),

    /// A range was requested with a step of zero.
    #[error("Range step must not be zero")]
    InvalidStep,

    /// An image operation on an item without an image.
    #[error("{0} does not have an image")]
    NoImage(String),

    /// Navigation ran past either end of the catalogue.
    #[error("No item {0}")]
    Exhausted(String),

    /// An archive date used a month name outside the English month table.
    #[error("Unknown month name: {0:?}")]
    UnknownMonth(String),

    /// A date could not be built from its parts.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A numeric field held something other than digits.
    #[error("Malformed {field} field: {value:?}")]
    Malformed { field: &'static str, value: String },

    /// Expected markup was not present in a scraped page.
    #[error("Missing element: {0}")]
    MissingElement(String),
}

/// Result type alias for XkcdError.
///
/// This is a convenience alias for `std::result::Result<T, XkcdError>`.
pub type Result<T> = std::result::Result<T, XkcdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XkcdError::InvalidKey("abc".to_string());
        assert!(err.to_string().contains("Invalid key"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_status_error() {
        let err = XkcdError::Status { url: "https://xkcd.com/0/".to_string(), status: 404 };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("xkcd.com"));
    }

    #[test]
    fn test_timeout_error() {
        let err = XkcdError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_malformed_error() {
        let err = XkcdError::Malformed { field: "day", value: "1st".to_string() };
        assert_eq!(err.to_string(), "Malformed day field: \"1st\"");
    }
}
