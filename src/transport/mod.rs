//! Outbound HTTP capability.
//!
//! The sync layer never touches `reqwest` directly: it fetches documents and
//! posts hub forms through [`Transport`], which [`HttpTransport`] implements.

mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpConfig, HttpTransport};

/// Errors that can occur while talking to a remote endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with a non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its time budget
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Fewer bytes arrived than Content-Length promised
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// POST `fields` as `application/x-www-form-urlencoded` and return the
    /// response status. Never retried; status interpretation is the caller's.
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<u16, FetchError>;
}
