use secrecy::ExposeSecret;

use super::schema::Database;
use super::types::{Feed, FeedId, FeedRow, NewFeed, StorageError};

const FEED_COLUMNS: &str = "id, remote_url, verify_token, secret, hubs, author_id";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed with its tokens and initial hub list, returning the stored row
    pub async fn create_feed(&self, new: NewFeed) -> Result<Feed, StorageError> {
        let hubs = serde_json::to_string(&new.hubs).map_err(|source| StorageError::CorruptHubs {
            feed_id: 0,
            source,
        })?;
        let now = chrono::Utc::now().timestamp();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (remote_url, verify_token, secret, hubs, author_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&new.remote_url)
        .bind(&new.verify_token)
        .bind(new.secret.expose_secret())
        .bind(&hubs)
        .bind(new.author_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        tracing::debug!(feed_id = id, remote = ?new.remote_url, "Feed row created");

        Ok(Feed {
            id,
            remote_url: new.remote_url,
            verify_token: new.verify_token,
            secret: new.secret,
            hubs: new.hubs,
            author_id: new.author_id,
        })
    }

    pub async fn find_feed(&self, id: FeedId) -> Result<Option<Feed>, StorageError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    pub async fn find_feed_by_remote_url(&self, url: &str) -> Result<Option<Feed>, StorageError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE remote_url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FeedRow::into_feed).transpose()
    }

    /// All feeds, oldest first
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StorageError> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeedRow::into_feed).collect()
    }

    /// Persist the mutable parts of a feed: hub list and author.
    ///
    /// `verify_token` and `secret` are not written; they are
    /// fixed at creation.
    pub async fn save_feed(&self, feed: &Feed) -> Result<(), StorageError> {
        let hubs =
            serde_json::to_string(&feed.hubs).map_err(|source| StorageError::CorruptHubs {
                feed_id: feed.id,
                source,
            })?;

        sqlx::query("UPDATE feeds SET hubs = ?, author_id = ? WHERE id = ?")
            .bind(&hubs)
            .bind(feed.author_id)
            .bind(feed.id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn new_feed(remote_url: Option<&str>) -> NewFeed {
        NewFeed {
            remote_url: remote_url.map(String::from),
            verify_token: "verify-1".into(),
            secret: SecretString::from("secret-1"),
            hubs: vec!["http://pubsubhubbub.appspot.com/publish".into()],
            author_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_feed() {
        let db = test_db().await;
        let created = db
            .create_feed(new_feed(Some("https://remote.example.org/a.atom")))
            .await
            .unwrap();
        assert!(created.id > 0);

        let found = db.find_feed(created.id).await.unwrap().unwrap();
        assert_eq!(found.remote_url.as_deref(), Some("https://remote.example.org/a.atom"));
        assert_eq!(found.verify_token, "verify-1");
        assert_eq!(found.secret.expose_secret(), "secret-1");
        assert_eq!(found.hubs, vec!["http://pubsubhubbub.appspot.com/publish"]);
        assert!(!found.is_populated());
    }

    #[tokio::test]
    async fn test_find_feed_by_remote_url() {
        let db = test_db().await;
        let created = db
            .create_feed(new_feed(Some("https://remote.example.org/a.atom")))
            .await
            .unwrap();

        let found = db
            .find_feed_by_remote_url("https://remote.example.org/a.atom")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(db
            .find_feed_by_remote_url("https://other.example.org/")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_feed_is_none() {
        let db = test_db().await;
        assert!(db.find_feed(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_feed_keeps_hub_order_and_duplicates() {
        let db = test_db().await;
        let mut feed = db.create_feed(new_feed(None)).await.unwrap();
        feed.hubs = vec![
            "https://hub-b.example.com/".into(),
            "https://hub-a.example.com/".into(),
            "https://hub-b.example.com/".into(),
        ];
        db.save_feed(&feed).await.unwrap();

        let found = db.find_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(found.hubs, feed.hubs);
    }

    #[tokio::test]
    async fn test_save_feed_never_rewrites_tokens() {
        let db = test_db().await;
        let mut feed = db.create_feed(new_feed(None)).await.unwrap();
        feed.verify_token = "tampered".into();
        feed.secret = SecretString::from("tampered");
        db.save_feed(&feed).await.unwrap();

        let found = db.find_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(found.verify_token, "verify-1");
        assert_eq!(found.secret.expose_secret(), "secret-1");
    }

    #[tokio::test]
    async fn test_remote_url_unique() {
        let db = test_db().await;
        db.create_feed(new_feed(Some("https://remote.example.org/a.atom")))
            .await
            .unwrap();
        assert!(db
            .create_feed(new_feed(Some("https://remote.example.org/a.atom")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_feeds_in_creation_order() {
        let db = test_db().await;
        let a = db.create_feed(new_feed(None)).await.unwrap();
        let b = db
            .create_feed(new_feed(Some("https://remote.example.org/b.atom")))
            .await
            .unwrap();
        let ids: Vec<_> = db.list_feeds().await.unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}
