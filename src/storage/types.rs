use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub type FeedId = i64;
pub type AuthorId = i64;
pub type UpdateId = i64;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another process holds the database lock
    #[error("The database is locked by another hubbub process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored hub list could not be decoded
    #[error("Corrupt hub list for feed {feed_id}: {source}")]
    CorruptHubs {
        feed_id: FeedId,
        #[source]
        source: serde_json::Error,
    },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Classify a sqlx error, surfacing SQLite lock contention separately
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StorageError::InstanceLocked;
        }

        StorageError::Other(err)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AuthorRow {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub remote_url: Option<String>,
    pub image_url: Option<String>,
}

impl AuthorRow {
    pub(crate) fn into_author(self) -> Author {
        Author {
            id: self.id,
            name: self.name,
            username: self.username,
            email: self.email,
            remote_url: self.remote_url,
            image_url: self.image_url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: i64,
    pub remote_url: Option<String>,
    pub verify_token: String,
    pub secret: String,
    pub hubs: String,
    pub author_id: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Result<Feed, StorageError> {
        let hubs: Vec<String> =
            serde_json::from_str(&self.hubs).map_err(|source| StorageError::CorruptHubs {
                feed_id: self.id,
                source,
            })?;
        Ok(Feed {
            id: self.id,
            remote_url: self.remote_url,
            verify_token: self.verify_token,
            secret: SecretString::from(self.secret),
            hubs,
            author_id: self.author_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UpdateRow {
    pub id: i64,
    pub feed_id: i64,
    pub author_id: i64,
    pub url: String,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UpdateRow {
    pub(crate) fn into_update(self) -> Update {
        Update {
            id: self.id,
            feed_id: self.feed_id,
            author_id: self.author_id,
            url: self.url,
            text: self.text,
            created_at: from_unix(self.created_at),
            updated_at: from_unix(self.updated_at),
        }
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// ============================================================================
// Data Structures
// ============================================================================

/// The person behind a feed.
///
/// Created once when a feed is populated and never mutated afterwards, so
/// feeds and updates refer to it by id rather than holding copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: AuthorId,
    /// Display name (PortableContacts `displayName`)
    pub name: String,
    /// Handle; the Atom `<author><name>`
    pub username: String,
    pub email: Option<String>,
    /// Canonical profile URL
    pub remote_url: Option<String>,
    /// Avatar image URL (feed icon, falling back to logo)
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAuthor {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub remote_url: Option<String>,
    pub image_url: Option<String>,
}

/// A local or remote-backed syndicated stream.
///
/// `verify_token` and `secret` are issued at creation and never rewritten;
/// [`Database::save_feed`](super::Database::save_feed) only persists `hubs`
/// and `author_id`. The secret is a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug)]
pub struct Feed {
    pub id: FeedId,
    pub remote_url: Option<String>,
    pub verify_token: String,
    pub secret: SecretString,
    /// Hub endpoints in advertisement order; `hubs[0]` is primary. Duplicates
    /// are kept as-is.
    pub hubs: Vec<String>,
    /// `None` until the feed has been populated (remote) or created with an
    /// author (local).
    pub author_id: Option<AuthorId>,
}

impl Feed {
    /// A feed is local iff it has no remote URL.
    pub fn is_local(&self) -> bool {
        self.remote_url.is_none()
    }

    pub fn is_populated(&self) -> bool {
        self.author_id.is_some()
    }

    /// The topic URL: the remote URL, or `/feeds/{id}` for local feeds.
    pub fn url(&self) -> String {
        match &self.remote_url {
            Some(url) => url.clone(),
            None => format!("/feeds/{}", self.id),
        }
    }

    /// Absolute URL of the feed document, resolving local feeds against
    /// the public base URI.
    pub fn absolute_url(&self, base_uri: &str) -> String {
        match &self.remote_url {
            Some(url) => url.clone(),
            None => format!("{}feeds/{}.atom", with_trailing_slash(base_uri), self.id),
        }
    }
}

impl Clone for Feed {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            remote_url: self.remote_url.clone(),
            verify_token: self.verify_token.clone(),
            secret: SecretString::from(self.secret.expose_secret().to_owned()),
            hubs: self.hubs.clone(),
            author_id: self.author_id,
        }
    }
}

pub(crate) fn with_trailing_slash(base_uri: &str) -> std::borrow::Cow<'_, str> {
    if base_uri.ends_with('/') {
        std::borrow::Cow::Borrowed(base_uri)
    } else {
        std::borrow::Cow::Owned(format!("{base_uri}/"))
    }
}

#[derive(Debug)]
pub struct NewFeed {
    pub remote_url: Option<String>,
    pub verify_token: String,
    pub secret: SecretString,
    pub hubs: Vec<String>,
    pub author_id: Option<AuthorId>,
}

/// A single entry. `url` is the canonical URL and the global dedup key;
/// it never changes once the update exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: UpdateId,
    pub feed_id: FeedId,
    pub author_id: AuthorId,
    pub url: String,
    /// Plain text, already extracted from markup
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUpdate {
    pub feed_id: FeedId,
    pub author_id: AuthorId,
    pub url: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
