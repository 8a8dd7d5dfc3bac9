use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{AuditError, AuditEvent, AuditSink};

/// Appends to the `audit_events` table.
#[derive(Clone)]
pub struct PgAuditSink {
    db: Pool<Postgres>,
}

impl PgAuditSink {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (id, event_type, actor_id, subject_id, conversation_id, message_id, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id)
        .bind(&event.event_type)
        .bind(event.actor)
        .bind(event.subject)
        .bind(event.conversation_id)
        .bind(event.message_id)
        .bind(&event.metadata)
        .bind(event.occurred_at)
        .execute(&self.db)
        .await?;

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "audit event recorded"
        );

        Ok(())
    }
}
