use super::schema::Database;
use super::types::{Author, AuthorId, AuthorRow, NewAuthor, StorageError};

impl Database {
    // ========================================================================
    // Author Operations
    // ========================================================================

    pub async fn create_author(&self, new: NewAuthor) -> Result<Author, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO authors (name, username, email, remote_url, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&new.name)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.remote_url)
        .bind(&new.image_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(Author {
            id,
            name: new.name,
            username: new.username,
            email: new.email,
            remote_url: new.remote_url,
            image_url: new.image_url,
        })
    }

    pub async fn find_author(&self, id: AuthorId) -> Result<Option<Author>, StorageError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, name, username, email, remote_url, image_url FROM authors WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AuthorRow::into_author))
    }

    pub async fn count_authors(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
