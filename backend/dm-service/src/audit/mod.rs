//! Security-relevant event trail.
//!
//! Recording is best effort: a sink reports failure through [`AuditError`] and callers log it,
//! they never turn it into a failed request.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryAuditSink;
pub use postgres::PgAuditSink;

pub mod event_types {
    pub const MESSAGE_SENT: &str = "message.sent";
    pub const MESSAGE_SEND_DENIED: &str = "message.send_denied";
    pub const CONVERSATION_DELETED: &str = "conversation.deleted";
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub actor: Uuid,
    /// The other user the event concerns, if any
    pub subject: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    fn new(event_type: &str, actor: Uuid, subject: Option<Uuid>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            actor,
            subject,
            conversation_id: None,
            message_id: None,
            metadata: json!({}),
            occurred_at: Utc::now(),
        }
    }

    pub fn message_sent(actor: Uuid, receiver: Uuid, conversation_id: Uuid, message_id: Uuid) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            message_id: Some(message_id),
            ..Self::new(event_types::MESSAGE_SENT, actor, Some(receiver))
        }
    }

    pub fn send_denied(actor: Uuid, receiver: Uuid, reason: &str) -> Self {
        Self {
            metadata: json!({ "reason": reason }),
            ..Self::new(event_types::MESSAGE_SEND_DENIED, actor, Some(receiver))
        }
    }

    pub fn conversation_deleted(
        actor: Uuid,
        peer: Uuid,
        conversation_id: Uuid,
        deleted_count: u64,
    ) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            metadata: json!({ "deleted_count": deleted_count }),
            ..Self::new(event_types::CONVERSATION_DELETED, actor, Some(peer))
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_fill_identifiers() {
        let (actor, peer, conv, msg) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let sent = AuditEvent::message_sent(actor, peer, conv, msg);
        assert_eq!(sent.event_type, "message.sent");
        assert_eq!(sent.conversation_id, Some(conv));
        assert_eq!(sent.message_id, Some(msg));

        let denied = AuditEvent::send_denied(actor, peer, "blocked");
        assert_eq!(denied.metadata["reason"], "blocked");
        assert!(denied.message_id.is_none());

        let deleted = AuditEvent::conversation_deleted(actor, peer, conv, 3);
        assert_eq!(deleted.metadata["deleted_count"], 3);
    }
}
