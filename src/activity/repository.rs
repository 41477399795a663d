//! Read-only queries over user activity. Every query is scoped by user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::activity::{CALL_SCHEDULED, Conversation, Document, VoiceCall};
use crate::error::Result;
use crate::user::UserId;

/// Port for activity reads.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Number of documents owned by `user`.
    async fn count_documents(&self, user: UserId) -> Result<i64>;

    /// Number of processed documents created at or after `since`.
    async fn count_processed_documents_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Number of chat queries created at or after `since`.
    async fn count_queries_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Active conversations, most recently updated first.
    async fn recent_active_conversations(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Conversation>>;

    /// Documents, most recently created first.
    async fn recent_documents(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Document>>;

    /// Scheduled calls at or after `from`, nearest first.
    async fn upcoming_calls(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<VoiceCall>>;
}

/// PostgreSQL activity repository.
#[derive(Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    /// Create a new [`PgActivityRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn count_documents(&self, user: UserId) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM financial_documents WHERE user_id = $1",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_processed_documents_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM financial_documents
                WHERE user_id = $1 AND is_processed AND created_at >= $2"#,
        )
        .bind(user)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_queries_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_queries WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn recent_active_conversations(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Conversation>> {
        Ok(sqlx::query_as::<_, Conversation>(
            r#"SELECT id, user_id AS "user", title, is_active, created_at, updated_at
                FROM ai_conversations
                WHERE user_id = $1 AND is_active
                ORDER BY updated_at DESC
                LIMIT $2"#,
        )
        .bind(user)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn recent_documents(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Document>> {
        Ok(sqlx::query_as::<_, Document>(
            r#"SELECT id, user_id AS "user", title, document_type, is_processed, created_at
                FROM financial_documents
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2"#,
        )
        .bind(user)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upcoming_calls(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<VoiceCall>> {
        Ok(sqlx::query_as::<_, VoiceCall>(
            r#"SELECT id, user_id AS "user", topic, status, scheduled_time, duration_minutes
                FROM voice_calls
                WHERE user_id = $1 AND status = $2 AND scheduled_time >= $3
                ORDER BY scheduled_time ASC
                LIMIT $4"#,
        )
        .bind(user)
        .bind(CALL_SCHEDULED)
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[sqlx::test(fixtures("../../fixtures/activity.sql"))]
    #[ignore = "requires a PostgreSQL instance"]
    async fn test_scoped_by_user(pool: PgPool) {
        let repo = PgActivityRepository::new(pool);
        let since = DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(repo.count_documents(1).await.unwrap(), 4);
        assert_eq!(repo.count_documents(2).await.unwrap(), 1);
        assert_eq!(
            repo.count_processed_documents_since(1, since).await.unwrap(),
            2
        );
        assert_eq!(repo.count_queries_since(1, since).await.unwrap(), 2);

        let conversations = repo.recent_active_conversations(1, 3).await.unwrap();
        assert!(conversations.iter().all(|c| c.user == 1 && c.is_active));

        let calls = repo
            .upcoming_calls(1, since + Duration::days(10), 3)
            .await
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].topic, "Quarterly VAT review");
    }
}
