use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    domain::comment::CommentRecord, repository::errors::RepositoryError,
    usecase::contracts::CommentRepository,
};

pub struct SqliteCommentRepository {
    pool: SqlitePool,
}

impl SqliteCommentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    #[tracing::instrument(skip(self))]
    async fn load_all(&self) -> Result<Vec<CommentRecord>, RepositoryError> {
        tracing::debug!("loading all comments");

        let records = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT id, text, timestamp, parent_id
            FROM comments
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = records.len(), "loaded comments");
        Ok(records)
    }

    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_all(&self, records: Vec<CommentRecord>) -> Result<(), RepositoryError> {
        tracing::debug!("replacing all comments");

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM comments")
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO comments (id, text, timestamp, parent_id)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(record.id)
            .bind(&record.text)
            .bind(record.timestamp)
            .bind(record.parent_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = records.len(), "comments replaced successfully");
        Ok(())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, RepositoryError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| RepositoryError::ConnectionError(e.to_string()))
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), RepositoryError> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn record(text: &str, timestamp: i64, parent_id: Option<Uuid>) -> CommentRecord {
        CommentRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            timestamp,
            parent_id,
        }
    }

    fn sorted(mut records: Vec<CommentRecord>) -> Vec<CommentRecord> {
        records.sort_by_key(|r| r.id);
        records
    }

    #[tokio::test]
    async fn test_load_all_empty_store() {
        let repository = SqliteCommentRepository::new(memory_pool().await);

        let records = repository.load_all().await.unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_then_load_all() {
        let repository = SqliteCommentRepository::new(memory_pool().await);
        let root = record("Hello", 1_000, None);
        let reply = record("Hi back", 2_000, Some(root.id));
        let records = vec![root, reply];

        assert_ok!(repository.replace_all(records.clone()).await);
        let loaded = assert_ok!(repository.load_all().await);

        assert_eq!(sorted(loaded), sorted(records));
    }

    #[tokio::test]
    async fn test_replace_all_drops_previous_records() {
        let repository = SqliteCommentRepository::new(memory_pool().await);
        repository
            .replace_all(vec![record("old", 1, None), record("older", 0, None)])
            .await
            .unwrap();

        let fresh = record("fresh", 2, None);
        repository.replace_all(vec![fresh.clone()]).await.unwrap();

        assert_eq!(repository.load_all().await.unwrap(), vec![fresh]);
    }

    #[tokio::test]
    async fn test_replace_all_with_empty_set_clears_store() {
        let repository = SqliteCommentRepository::new(memory_pool().await);
        repository.replace_all(vec![record("gone", 1, None)]).await.unwrap();

        repository.replace_all(vec![]).await.unwrap();

        assert!(repository.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_prior_contents() {
        let repository = SqliteCommentRepository::new(memory_pool().await);
        let kept = record("kept", 1, None);
        repository.replace_all(vec![kept.clone()]).await.unwrap();

        let first = record("first", 2, None);
        let mut clash = record("clash", 3, None);
        clash.id = first.id;
        let err = assert_err!(repository.replace_all(vec![first, clash]).await);

        assert!(matches!(err, RepositoryError::DatabaseError(_)));
        assert_eq!(repository.load_all().await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn test_create_pool_fails_for_unreachable_path() {
        let result = create_pool("sqlite:///nonexistent-comment-thread-dir/comments.db", 1).await;

        assert!(matches!(result, Err(RepositoryError::ConnectionError(_))));
    }
}
