//! Persistence for conversations and messages.
//!
//! Each backend is one object implementing both traits, so `MessageStore::append` can create the
//! conversation, insert the row and touch the conversation as one atomic unit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Conversation, ConversationSummary, Message, NewMessage, PageRequest, ParticipantPair,
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Atomic find-or-insert on the canonical pair. Concurrent first contact from both sides
    /// resolves to a single row.
    async fn get_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation>;

    async fn find(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>>;

    /// Move `updated_at` forward to now. Never moves it backwards.
    async fn touch(&self, conversation_id: Uuid) -> AppResult<()>;

    /// Conversations where `user_id` still sees at least one message, most recently active
    /// first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<ConversationSummary>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert an unread, undeleted row in one unit of work with its conversation:
    /// the sender/receiver pair's conversation is created with id `message.conversation_id` if
    /// missing, then touched to `message.sent_at`.
    ///
    /// Fails with [`AppError::Conflict`](crate::error::AppError::Conflict) and writes nothing
    /// when the pair already has a conversation under a different id.
    async fn append(&self, message: NewMessage) -> AppResult<Message>;

    /// Messages between the two users that `viewer` has not deleted, newest first. Ties on
    /// `sent_at` fall back to insertion order.
    async fn list_between(
        &self,
        viewer: Uuid,
        peer: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<Message>>;

    /// Flip `is_read` on every unread message `peer` sent to `viewer`. Returns rows changed.
    async fn mark_read_from_peer(&self, peer: Uuid, viewer: Uuid) -> AppResult<u64>;

    /// Set the viewer's own deletion flag on every message in the conversation that does not
    /// already carry it. Returns rows changed.
    async fn soft_delete_conversation(&self, viewer: Uuid, peer: Uuid) -> AppResult<u64>;

    /// Unread messages from `peer` to `viewer` that `viewer` has not deleted.
    async fn unread_count(&self, viewer: Uuid, peer: Uuid) -> AppResult<i64>;
}
