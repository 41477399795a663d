//! Manage opaque bearer tokens.
//!
//! Only the SHA-256 digest of a token is stored, along with its first
//! characters used as a lookup key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};

use crate::clock::Clock;
use crate::crypto::{digest, generate_token, token_key};
use crate::error::{Result, ServerError};
use crate::user::UserId;

/// Default lifetime of a token, in hours.
pub const DEFAULT_TTL_HOURS: i64 = 10;

/// Stored token.
#[derive(Clone, Debug, PartialEq, FromRow)]
pub struct AuthToken {
    pub digest: String,
    pub token_key: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthToken {
    /// Whether the token can no longer be used at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry < now)
    }
}

/// Port for token persistence.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &AuthToken) -> Result<()>;

    /// Every token sharing the lookup key.
    async fn find_by_key(&self, token_key: &str) -> Result<Vec<AuthToken>>;

    async fn delete(&self, digest: &str) -> Result<()>;

    /// Remove every token of a user. Returns how many were removed.
    async fn delete_for_user(&self, user_id: UserId) -> Result<u64>;
}

/// PostgreSQL token repository.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    /// Create a new [`PgTokenRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn insert(&self, token: &AuthToken) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO auth_tokens (digest, token_key, user_id, created_at, expiry)
                VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&token.digest)
        .bind(&token.token_key)
        .bind(token.user_id)
        .bind(token.created_at)
        .bind(token.expiry)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_key(&self, token_key: &str) -> Result<Vec<AuthToken>> {
        Ok(sqlx::query_as::<_, AuthToken>(
            r#"SELECT digest, token_key, user_id, created_at, expiry
                FROM auth_tokens
                WHERE token_key = $1"#,
        )
        .bind(token_key)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete(&self, digest: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE digest = $1")
            .bind(digest)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64> {
        Ok(sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected())
    }
}

/// Issue, check and revoke tokens.
#[derive(Clone)]
pub struct TokenManager {
    repo: Arc<dyn TokenRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    ///
    /// A `ttl_hours` that does not fit a [`Duration`] falls back to
    /// [`DEFAULT_TTL_HOURS`].
    pub fn new(repo: Arc<dyn TokenRepository>, clock: Arc<dyn Clock>, ttl_hours: i64) -> Self {
        let ttl = Duration::try_hours(ttl_hours).unwrap_or_else(|| {
            tracing::warn!(ttl_hours, "token TTL out of range, using default");
            Duration::hours(DEFAULT_TTL_HOURS)
        });

        Self { repo, clock, ttl }
    }

    /// Create and store a new token for `user_id`. The raw token is only
    /// returned here.
    pub async fn create(&self, user_id: UserId) -> Result<String> {
        let token = generate_token();
        let key = token_key(&token).ok_or_else(|| ServerError::Internal {
            details: "generated token is too short".into(),
            source: None,
        })?;
        let now = self.clock.now();
        let expiry = now
            .checked_add_signed(self.ttl)
            .or_else(|| now.checked_add_signed(Duration::hours(DEFAULT_TTL_HOURS)))
            .ok_or_else(|| ServerError::Internal {
                details: "token expiry is out of range".into(),
                source: None,
            })?;

        self.repo
            .insert(&AuthToken {
                digest: digest(&token),
                token_key: key.to_owned(),
                user_id,
                created_at: now,
                expiry: Some(expiry),
            })
            .await?;

        Ok(token)
    }

    /// Resolve a raw token to its owner. Expired tokens are deleted on
    /// sight.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserId>> {
        let Some(key) = token_key(token) else {
            return Ok(None);
        };
        let hashed = digest(token);
        let now = self.clock.now();

        for candidate in self.repo.find_by_key(key).await? {
            if candidate.is_expired(now) {
                self.repo.delete(&candidate.digest).await?;
                continue;
            }

            if candidate.digest == hashed {
                return Ok(Some(candidate.user_id));
            }
        }

        Ok(None)
    }

    /// Revoke a single token.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.repo.delete(&digest(token)).await
    }

    /// Revoke every token of `user_id`.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<u64> {
        let count = self.repo.delete_for_user(user_id).await?;
        tracing::debug!(user_id, count, "revoked all tokens");
        Ok(count)
    }
}
