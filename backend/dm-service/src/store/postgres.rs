use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{ConversationStore, MessageStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    now_micros, Conversation, ConversationSummary, LastMessage, Message, NewMessage,
    PageRequest, ParticipantPair,
};

#[derive(Clone)]
pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

/// Insert the pair's conversation under `id`, or return the existing row untouched.
async fn upsert_conversation<'e, E>(
    executor: E,
    pair: ParticipantPair,
    id: Uuid,
    at: DateTime<Utc>,
) -> AppResult<Conversation>
where
    E: PgExecutor<'e>,
{
    // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
    sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (id, participant_low, participant_high, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (participant_low, participant_high)
        DO UPDATE SET participant_low = EXCLUDED.participant_low
        RETURNING id, participant_low, participant_high, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(pair.low())
    .bind(pair.high())
    .bind(at)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        let err = AppError::from(e);
        if err.is_unique_violation() {
            AppError::Conflict("conversation already exists for participant pair".into())
        } else {
            err
        }
    })
}

async fn touch_conversation<'e, E>(executor: E, id: Uuid, at: DateTime<Utc>) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE conversations SET updated_at = GREATEST(updated_at, $2) WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    conversation_id: Uuid,
    other_user_id: Uuid,
    last_message_id: Uuid,
    last_sender_id: Uuid,
    last_sent_at: DateTime<Utc>,
    unread_count: i64,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for ConversationSummary {
    fn from(row: SummaryRow) -> Self {
        ConversationSummary {
            conversation_id: row.conversation_id,
            other_user_id: row.other_user_id,
            last_message: Some(LastMessage {
                message_id: row.last_message_id,
                sender_id: row.last_sender_id,
                sent_at: row.last_sent_at,
            }),
            unread_count: row.unread_count,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn get_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation> {
        upsert_conversation(&self.db, pair, Uuid::new_v4(), now_micros()).await
    }

    async fn find(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, participant_low, participant_high, created_at, updated_at
            FROM conversations
            WHERE participant_low = $1 AND participant_high = $2
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&self.db)
        .await?;

        Ok(conversation)
    }

    async fn touch(&self, conversation_id: Uuid) -> AppResult<()> {
        touch_conversation(&self.db, conversation_id, now_micros()).await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                c.id AS conversation_id,
                CASE WHEN c.participant_low = $1 THEN c.participant_high
                     ELSE c.participant_low END AS other_user_id,
                lm.id AS last_message_id,
                lm.sender_id AS last_sender_id,
                lm.sent_at AS last_sent_at,
                (
                    SELECT COUNT(*) FROM messages u
                    WHERE u.conversation_id = c.id
                      AND u.receiver_id = $1
                      AND u.is_read = FALSE
                      AND u.deleted_by_receiver = FALSE
                ) AS unread_count,
                c.updated_at
            FROM conversations c
            JOIN LATERAL (
                SELECT m.id, m.sender_id, m.sent_at
                FROM messages m
                WHERE m.conversation_id = c.id
                  AND ((m.sender_id = $1 AND m.deleted_by_sender = FALSE)
                    OR (m.receiver_id = $1 AND m.deleted_by_receiver = FALSE))
                ORDER BY m.sent_at DESC, m.seq DESC
                LIMIT 1
            ) lm ON TRUE
            WHERE c.participant_low = $1 OR c.participant_high = $1
            ORDER BY c.updated_at DESC, c.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        let pair = ParticipantPair::new(message.sender_id, message.receiver_id)?;
        let mut tx = self.db.begin().await?;

        // Dropping `tx` on any early return rolls back the upsert as well.
        let conversation =
            upsert_conversation(&mut *tx, pair, message.conversation_id, message.sent_at).await?;
        if conversation.id != message.conversation_id {
            return Err(AppError::Conflict(
                "participant pair already has another conversation".into(),
            ));
        }

        let stored = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (
                id, conversation_id, sender_id, receiver_id, ciphertext,
                wrapped_key_for_sender, wrapped_key_for_receiver,
                envelope_version, integrity_tag, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, conversation_id, sender_id, receiver_id, ciphertext,
                      wrapped_key_for_sender, wrapped_key_for_receiver,
                      envelope_version, integrity_tag, is_read,
                      deleted_by_sender, deleted_by_receiver, sent_at
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.envelope.ciphertext)
        .bind(&message.envelope.wrapped_key_for_sender)
        .bind(&message.envelope.wrapped_key_for_receiver)
        .bind(message.envelope_version)
        .bind(&message.integrity_tag)
        .bind(message.sent_at)
        .fetch_one(&mut *tx)
        .await?;

        touch_conversation(&mut *tx, message.conversation_id, message.sent_at).await?;

        tx.commit().await?;

        tracing::debug!(
            message_id = %stored.id,
            conversation_id = %stored.conversation_id,
            "message row inserted"
        );

        Ok(stored)
    }

    async fn list_between(
        &self,
        viewer: Uuid,
        peer: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, receiver_id, ciphertext,
                   wrapped_key_for_sender, wrapped_key_for_receiver,
                   envelope_version, integrity_tag, is_read,
                   deleted_by_sender, deleted_by_receiver, sent_at
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2 AND deleted_by_sender = FALSE)
               OR (sender_id = $2 AND receiver_id = $1 AND deleted_by_receiver = FALSE)
            ORDER BY sent_at DESC, seq DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(viewer)
        .bind(peer)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    async fn mark_read_from_peer(&self, peer: Uuid, viewer: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(peer)
        .bind(viewer)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete_conversation(&self, viewer: Uuid, peer: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET
                deleted_by_sender = CASE WHEN sender_id = $1 THEN TRUE ELSE deleted_by_sender END,
                deleted_by_receiver = CASE WHEN receiver_id = $1 THEN TRUE ELSE deleted_by_receiver END
            WHERE (sender_id = $1 AND receiver_id = $2 AND deleted_by_sender = FALSE)
               OR (sender_id = $2 AND receiver_id = $1 AND deleted_by_receiver = FALSE)
            "#,
        )
        .bind(viewer)
        .bind(peer)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, viewer: Uuid, peer: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE sender_id = $1 AND receiver_id = $2
              AND is_read = FALSE AND deleted_by_receiver = FALSE
            "#,
        )
        .bind(peer)
        .bind(viewer)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }
}
