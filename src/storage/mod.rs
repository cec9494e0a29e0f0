//! Persistence for feeds, authors and updates.
//!
//! The sync layer talks to storage through the [`Repository`] trait and treats
//! every call as atomic and durable. [`Database`] is the SQLite
//! implementation.

mod authors;
mod feeds;
mod schema;
mod types;
mod updates;

use async_trait::async_trait;

pub use schema::Database;
pub use types::{
    Author, AuthorId, Feed, FeedId, NewAuthor, NewFeed, NewUpdate, StorageError, Update, UpdateId,
};
pub(crate) use types::with_trailing_slash;

/// The persistence collaborator.
///
/// Canonical entry URLs are unique across the whole store, not per feed:
/// `find_update_by_url` searches every feed.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_feed(&self, new: NewFeed) -> Result<Feed, StorageError>;
    async fn find_feed(&self, id: FeedId) -> Result<Option<Feed>, StorageError>;
    async fn find_feed_by_remote_url(&self, url: &str) -> Result<Option<Feed>, StorageError>;
    async fn list_feeds(&self) -> Result<Vec<Feed>, StorageError>;
    /// Persists `hubs` and `author_id`; tokens are immutable.
    async fn save_feed(&self, feed: &Feed) -> Result<(), StorageError>;

    async fn find_author(&self, id: AuthorId) -> Result<Option<Author>, StorageError>;
    async fn create_author(&self, new: NewAuthor) -> Result<Author, StorageError>;

    async fn find_update_by_url(&self, url: &str) -> Result<Option<Update>, StorageError>;
    async fn create_update(&self, new: NewUpdate) -> Result<Update, StorageError>;
    async fn save_update(&self, update: &Update) -> Result<(), StorageError>;
    /// The newest updates owned by `feed_id` (capped), in insertion order.
    async fn updates_for_feed(&self, feed_id: FeedId) -> Result<Vec<Update>, StorageError>;
}

#[async_trait]
impl Repository for Database {
    async fn create_feed(&self, new: NewFeed) -> Result<Feed, StorageError> {
        Database::create_feed(self, new).await
    }

    async fn find_feed(&self, id: FeedId) -> Result<Option<Feed>, StorageError> {
        Database::find_feed(self, id).await
    }

    async fn find_feed_by_remote_url(&self, url: &str) -> Result<Option<Feed>, StorageError> {
        Database::find_feed_by_remote_url(self, url).await
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>, StorageError> {
        Database::list_feeds(self).await
    }

    async fn save_feed(&self, feed: &Feed) -> Result<(), StorageError> {
        Database::save_feed(self, feed).await
    }

    async fn find_author(&self, id: AuthorId) -> Result<Option<Author>, StorageError> {
        Database::find_author(self, id).await
    }

    async fn create_author(&self, new: NewAuthor) -> Result<Author, StorageError> {
        Database::create_author(self, new).await
    }

    async fn find_update_by_url(&self, url: &str) -> Result<Option<Update>, StorageError> {
        Database::find_update_by_url(self, url).await
    }

    async fn create_update(&self, new: NewUpdate) -> Result<Update, StorageError> {
        Database::create_update(self, new).await
    }

    async fn save_update(&self, update: &Update) -> Result<(), StorageError> {
        Database::save_update(self, update).await
    }

    async fn updates_for_feed(&self, feed_id: FeedId) -> Result<Vec<Update>, StorageError> {
        Database::updates_for_feed(self, feed_id).await
    }
}
