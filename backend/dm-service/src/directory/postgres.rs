use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{BlockDirectory, FollowDirectory, KeyDirectory, UserDirectory};
use crate::error::AppResult;
use crate::models::{DmPermission, UserKey};

/// Directory backed by the `users`, `user_keys`, `user_settings`, `blocks` and `follows` tables.
#[derive(Clone)]
pub struct PgDirectory {
    db: Pool<Postgres>,
}

impl PgDirectory {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyDirectory for PgDirectory {
    async fn lookup(&self, user_id: Uuid) -> AppResult<Option<UserKey>> {
        let key = sqlx::query_as::<_, UserKey>(
            r#"
            SELECT user_id, public_key_pem, fingerprint, registered_at
            FROM user_keys
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(key)
    }

    async fn register(&self, key: &UserKey) -> AppResult<UserKey> {
        let stored = sqlx::query_as::<_, UserKey>(
            r#"
            INSERT INTO user_keys (user_id, public_key_pem, fingerprint, registered_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET public_key_pem = EXCLUDED.public_key_pem,
                fingerprint = EXCLUDED.fingerprint,
                registered_at = EXCLUDED.registered_at
            RETURNING user_id, public_key_pem, fingerprint, registered_at
            "#,
        )
        .bind(key.user_id)
        .bind(&key.public_key_pem)
        .bind(&key.fingerprint)
        .bind(key.registered_at)
        .fetch_one(&self.db)
        .await?;

        Ok(stored)
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn exists(&self, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(exists)
    }

    async fn messaging_policy(&self, user_id: Uuid) -> AppResult<DmPermission> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT dm_permission FROM user_settings WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        let Some(raw) = stored else {
            return Ok(DmPermission::default());
        };

        Ok(raw.parse().unwrap_or_else(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "unrecognized dm_permission, using default");
            DmPermission::default()
        }))
    }
}

#[async_trait]
impl BlockDirectory for PgDirectory {
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> AppResult<bool> {
        let result: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM blocks WHERE blocker_id = $1 AND blocked_id = $2 LIMIT 1",
        )
        .bind(blocker)
        .bind(blocked)
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn has_block_between(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        let result: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM blocks
            WHERE (blocker_id = $1 AND blocked_id = $2)
               OR (blocker_id = $2 AND blocked_id = $1)
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }
}

#[async_trait]
impl FollowDirectory for PgDirectory {
    async fn is_following(&self, follower: Uuid, followee: Uuid) -> AppResult<bool> {
        let result: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2 LIMIT 1",
        )
        .bind(follower)
        .bind(followee)
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }
}
