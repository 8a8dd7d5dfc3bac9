use chrono::{DateTime, Utc};
use crypto_core::{RecordContext, SealedEnvelope};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored direct message.
///
/// Immutable after insert except `is_read` and the two `deleted_by_*` flags, each of which
/// only ever moves from false to true.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub ciphertext: String,
    pub wrapped_key_for_sender: String,
    pub wrapped_key_for_receiver: String,
    pub envelope_version: i32,
    pub integrity_tag: String,
    pub is_read: bool,
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// The wrapped content key `viewer` can unwrap, or `None` for outsiders.
    pub fn wrapped_key_for(&self, viewer: Uuid) -> Option<&str> {
        if viewer == self.sender_id {
            Some(&self.wrapped_key_for_sender)
        } else if viewer == self.receiver_id {
            Some(&self.wrapped_key_for_receiver)
        } else {
            None
        }
    }

    pub fn is_deleted_for(&self, viewer: Uuid) -> bool {
        if viewer == self.sender_id {
            self.deleted_by_sender
        } else if viewer == self.receiver_id {
            self.deleted_by_receiver
        } else {
            true
        }
    }

    pub fn integrity_input(&self) -> Vec<u8> {
        integrity_input(
            self.conversation_id,
            self.receiver_id,
            &self.ciphertext,
            &self.wrapped_key_for_sender,
            &self.wrapped_key_for_receiver,
        )
    }

    pub fn record_context(&self) -> RecordContext {
        RecordContext {
            timestamp: self.sent_at,
            author_id: self.sender_id,
            version: self.envelope_version,
        }
    }
}

/// Row handed to `MessageStore::append`. Identifiers and timestamp are assigned by the caller
/// so the integrity tag can cover them before the row exists.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub envelope: SealedEnvelope,
    pub envelope_version: i32,
    pub integrity_tag: String,
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            ciphertext: self.envelope.ciphertext,
            wrapped_key_for_sender: self.envelope.wrapped_key_for_sender,
            wrapped_key_for_receiver: self.envelope.wrapped_key_for_receiver,
            envelope_version: self.envelope_version,
            integrity_tag: self.integrity_tag,
            is_read: false,
            deleted_by_sender: false,
            deleted_by_receiver: false,
            sent_at: self.sent_at,
        }
    }
}

/// Canonical bytes covered by a message's integrity tag.
pub fn integrity_input(
    conversation_id: Uuid,
    receiver_id: Uuid,
    ciphertext: &str,
    wrapped_key_for_sender: &str,
    wrapped_key_for_receiver: &str,
) -> Vec<u8> {
    format!(
        "{conversation_id}\n{receiver_id}\n{ciphertext}\n{wrapped_key_for_sender}\n{wrapped_key_for_receiver}"
    )
    .into_bytes()
}

/// Public result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

/// A message as one participant sees it: only that participant's wrapped key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub ciphertext: String,
    pub wrapped_key: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl MessageView {
    pub fn for_viewer(message: Message, viewer: Uuid) -> Option<Self> {
        let wrapped_key = message.wrapped_key_for(viewer)?.to_string();
        Some(Self {
            message_id: message.id,
            sender_id: message.sender_id,
            ciphertext: message.ciphertext,
            wrapped_key,
            sent_at: message.sent_at,
            is_read: message.is_read,
        })
    }
}
