use super::schema::Database;
use super::types::{FeedId, NewUpdate, StorageError, Update, UpdateRow};

/// Maximum number of updates loaded for a single feed document (OOM protection)
pub(crate) const MAX_UPDATES_PER_FEED: i64 = 2000;

const UPDATE_COLUMNS: &str = "id, feed_id, author_id, url, text, created_at, updated_at";

impl Database {
    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Look up an update by canonical URL across every feed
    pub async fn find_update_by_url(&self, url: &str) -> Result<Option<Update>, StorageError> {
        let row = sqlx::query_as::<_, UpdateRow>(&format!(
            "SELECT {UPDATE_COLUMNS} FROM updates WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UpdateRow::into_update))
    }

    /// Insert a new update. Fails if the canonical URL already exists anywhere.
    pub async fn create_update(&self, new: NewUpdate) -> Result<Update, StorageError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO updates (feed_id, author_id, url, text, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(new.feed_id)
        .bind(new.author_id)
        .bind(&new.url)
        .bind(&new.text)
        .bind(new.created_at.timestamp())
        .bind(new.updated_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(UpdateRow {
            id,
            feed_id: new.feed_id,
            author_id: new.author_id,
            url: new.url,
            text: new.text,
            created_at: new.created_at.timestamp(),
            updated_at: new.updated_at.timestamp(),
        }
        .into_update())
    }

    /// Persist an update's text and timestamps. The canonical URL, owner and
    /// author are immutable and not written.
    pub async fn save_update(&self, update: &Update) -> Result<(), StorageError> {
        sqlx::query("UPDATE updates SET text = ?, created_at = ?, updated_at = ? WHERE id = ?")
            .bind(&update.text)
            .bind(update.created_at.timestamp())
            .bind(update.updated_at.timestamp())
            .bind(update.id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(())
    }

    /// The newest updates owned by a feed, returned in insertion order.
    ///
    /// Ordering for output is the codec's job; it needs insertion order as
    /// the tie-breaker for equal creation times. The cap keeps the most
    /// recent rows by creation time.
    pub async fn updates_for_feed(&self, feed_id: FeedId) -> Result<Vec<Update>, StorageError> {
        let rows = sqlx::query_as::<_, UpdateRow>(&format!(
            "SELECT {UPDATE_COLUMNS} FROM ( \
                 SELECT {UPDATE_COLUMNS} FROM updates WHERE feed_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? \
             ) ORDER BY id"
        ))
        .bind(feed_id)
        .bind(MAX_UPDATES_PER_FEED)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UpdateRow::into_update).collect())
    }

    pub async fn count_updates(&self, feed_id: FeedId) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM updates WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
