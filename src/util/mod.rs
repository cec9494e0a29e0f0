//! Utility functions shared across the crate.
//!
//! - **URL validation**: SSRF guard for feed fetches and hub pings
//! - **Text processing**: control-character stripping and whitespace cleanup
//!   for text extracted from remote entries

mod text;
mod url_validator;

pub use text::{normalize_whitespace, strip_control_chars};
pub use url_validator::{validate_url, UrlPolicy, UrlValidationError};
