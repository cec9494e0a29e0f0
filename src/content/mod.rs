//! Entry body to plain text.

mod extract;

pub use extract::{HtmlTextExtractor, TextExtractor};
