//! Atom wire format for OStatus feeds.
//!
//! - [`parser`] - turns a fetched or pushed document into a [`ParsedFeed`]
//!   using `feed-rs`, plus a `quick-xml` pass for PortableContacts fields
//! - [`writer`] - serializes a local [`FeedDocument`] back to Atom with
//!   `quick-xml`
//!
//! Both directions are stateless. Serialization is deterministic: the same
//! document and base URI always produce the same bytes.

mod parser;
mod writer;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::{Author, Feed, Update};

pub use parser::parse;
pub use writer::serialize;

/// Errors produced while reading or writing feed documents.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document is not a parseable feed
    #[error("Malformed feed document: {0}")]
    Malformed(String),
    /// The feed has no `<author>` block
    #[error("Feed document has no author")]
    MissingAuthor,
    /// Writing the document failed
    #[error("Failed to write feed document: {0}")]
    Write(String),
}

/// Author block of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthor {
    /// PortableContacts `displayName`, falling back to the Atom name
    pub display_name: String,
    /// Atom `<author><name>`
    pub username: String,
    pub email: Option<String>,
    pub uri: Option<String>,
    /// Feed `<icon>`, falling back to `<logo>`
    pub avatar_url: Option<String>,
}

/// How an entry's body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    PlainText,
    Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Canonical URL: the entry `<id>`, or its alternate link when the id
    /// is empty. This is the dedup key.
    pub url: String,
    /// Alternate link, if the entry has one
    pub link: Option<String>,
    pub title: Option<String>,
    /// Body before text extraction (content, falling back to summary)
    pub body: String,
    pub body_kind: BodyKind,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub author: ParsedAuthor,
    pub entries: Vec<ParsedEntry>,
    /// `rel="hub"` links in document order
    pub hubs: Vec<String>,
    /// Entries dropped because they had neither an id nor a link
    pub skipped: usize,
}

/// Everything needed to render a feed: the feed, its author, and the
/// updates it owns in insertion order.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub feed: Feed,
    pub author: Author,
    pub updates: Vec<Update>,
}
