use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ConversationStore, MessageStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    now_micros, Conversation, ConversationSummary, LastMessage, Message, NewMessage,
    PageRequest, ParticipantPair,
};

#[derive(Default)]
struct StoreState {
    conversations: HashMap<ParticipantPair, Conversation>,
    /// Insertion order doubles as the tie-breaker for equal `sent_at`.
    messages: Vec<Message>,
}

impl StoreState {
    /// The pair's conversation, inserted under `id` if the pair has none yet.
    fn conversation_entry(
        &mut self,
        pair: ParticipantPair,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> &mut Conversation {
        self.conversations.entry(pair).or_insert_with(|| Conversation {
            id,
            participant_low: pair.low(),
            participant_high: pair.high(),
            created_at: at,
            updated_at: at,
        })
    }

    fn visible_between(&self, viewer: Uuid, peer: Uuid) -> impl Iterator<Item = (usize, &Message)> {
        self.messages.iter().enumerate().filter(move |(_, m)| {
            (m.sender_id == viewer && m.receiver_id == peer && !m.deleted_by_sender)
                || (m.sender_id == peer && m.receiver_id == viewer && !m.deleted_by_receiver)
        })
    }
}

/// One lock guards both collections, so every operation is a single critical section.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.state.lock().conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }
}

fn touch_at(conversation: &mut Conversation, at: DateTime<Utc>) {
    conversation.updated_at = conversation.updated_at.max(at);
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_or_create(&self, pair: ParticipantPair) -> AppResult<Conversation> {
        let mut state = self.state.lock();
        Ok(state
            .conversation_entry(pair, Uuid::new_v4(), now_micros())
            .clone())
    }

    async fn find(&self, pair: ParticipantPair) -> AppResult<Option<Conversation>> {
        Ok(self.state.lock().conversations.get(&pair).cloned())
    }

    async fn touch(&self, conversation_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock();
        if let Some(conversation) = state
            .conversations
            .values_mut()
            .find(|c| c.id == conversation_id)
        {
            touch_at(conversation, now_micros());
        }
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<ConversationSummary>> {
        let state = self.state.lock();

        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter_map(|c| {
                let other = c.other_participant(user_id)?;
                let last = state
                    .visible_between(user_id, other)
                    .max_by_key(|(seq, m)| (m.sent_at, *seq))
                    .map(|(_, m)| LastMessage {
                        message_id: m.id,
                        sender_id: m.sender_id,
                        sent_at: m.sent_at,
                    })?;
                let unread_count = state
                    .messages
                    .iter()
                    .filter(|m| {
                        m.sender_id == other
                            && m.receiver_id == user_id
                            && !m.is_read
                            && !m.deleted_by_receiver
                    })
                    .count() as i64;

                Some(ConversationSummary {
                    conversation_id: c.id,
                    other_user_id: other,
                    last_message: Some(last),
                    unread_count,
                    updated_at: c.updated_at,
                })
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });

        Ok(paginate(summaries, page))
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: NewMessage) -> AppResult<Message> {
        let pair = ParticipantPair::new(message.sender_id, message.receiver_id)?;
        let mut state = self.state.lock();

        let conversation = state.conversation_entry(pair, message.conversation_id, message.sent_at);
        if conversation.id != message.conversation_id {
            return Err(AppError::Conflict(
                "participant pair already has another conversation".into(),
            ));
        }
        touch_at(conversation, message.sent_at);

        let stored = message.into_message();
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_between(
        &self,
        viewer: Uuid,
        peer: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<Message>> {
        let state = self.state.lock();
        let mut visible: Vec<(usize, &Message)> = state.visible_between(viewer, peer).collect();
        visible.sort_by(|(seq_a, a), (seq_b, b)| b.sent_at.cmp(&a.sent_at).then(seq_b.cmp(seq_a)));

        let ordered = visible.into_iter().map(|(_, m)| m.clone()).collect();
        Ok(paginate(ordered, page))
    }

    async fn mark_read_from_peer(&self, peer: Uuid, viewer: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock();
        let mut changed = 0;
        for m in state
            .messages
            .iter_mut()
            .filter(|m| m.sender_id == peer && m.receiver_id == viewer && !m.is_read)
        {
            m.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn soft_delete_conversation(&self, viewer: Uuid, peer: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock();
        let mut changed = 0;
        for m in state.messages.iter_mut() {
            if m.sender_id == viewer && m.receiver_id == peer && !m.deleted_by_sender {
                m.deleted_by_sender = true;
                changed += 1;
            } else if m.sender_id == peer && m.receiver_id == viewer && !m.deleted_by_receiver {
                m.deleted_by_receiver = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn unread_count(&self, viewer: Uuid, peer: Uuid) -> AppResult<i64> {
        let state = self.state.lock();
        let count = state
            .messages
            .iter()
            .filter(|m| {
                m.sender_id == peer && m.receiver_id == viewer && !m.is_read && !m.deleted_by_receiver
            })
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::SealedEnvelope;

    fn page() -> PageRequest {
        PageRequest::new(1, 50).unwrap()
    }

    async fn append(store: &InMemoryStore, from: Uuid, to: Uuid) -> Message {
        let conversation = store
            .get_or_create(ParticipantPair::new(from, to).unwrap())
            .await
            .unwrap();
        store
            .append(NewMessage {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                sender_id: from,
                receiver_id: to,
                envelope: SealedEnvelope {
                    ciphertext: "ct".into(),
                    wrapped_key_for_sender: "ks".into(),
                    wrapped_key_for_receiver: "kr".into(),
                },
                envelope_version: 1,
                integrity_tag: "tag".into(),
                sent_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_is_order_independent() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let ab = store.get_or_create(ParticipantPair::new(a, b).unwrap()).await.unwrap();
        let ba = store.get_or_create(ParticipantPair::new(b, a).unwrap()).await.unwrap();

        assert_eq!(ab.id, ba.id);
        assert_eq!(store.conversation_count(), 1);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let first = append(&store, a, b).await;
        let second = append(&store, a, b).await;

        {
            let mut state = store.state.lock();
            let ts = state.messages[0].sent_at;
            state.messages[1].sent_at = ts;
        }

        let listed = store.list_between(a, b, page()).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_append_touches_conversation() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pair = ParticipantPair::new(a, b).unwrap();
        let before = store.get_or_create(pair).await.unwrap().updated_at;

        let msg = append(&store, a, b).await;
        let after = store.find(pair).await.unwrap().unwrap().updated_at;

        assert!(after >= before);
        assert!(after >= msg.sent_at);
    }

    #[tokio::test]
    async fn test_soft_delete_only_sets_viewer_flag() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        append(&store, a, b).await;
        append(&store, b, a).await;

        assert_eq!(store.soft_delete_conversation(a, b).await.unwrap(), 2);
        assert_eq!(store.soft_delete_conversation(a, b).await.unwrap(), 0);

        let state = store.state.lock();
        for m in &state.messages {
            assert!(m.is_deleted_for(a));
            assert!(!m.is_deleted_for(b));
        }
    }

    #[tokio::test]
    async fn test_pagination_windows() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for _ in 0..5 {
            append(&store, a, b).await;
        }

        let first = store.list_between(b, a, PageRequest::new(1, 2).unwrap()).await.unwrap();
        let third = store.list_between(b, a, PageRequest::new(3, 2).unwrap()).await.unwrap();
        let beyond = store.list_between(b, a, PageRequest::new(4, 2).unwrap()).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(third.len(), 1);
        assert!(beyond.is_empty());
    }

    fn draft(conversation_id: Uuid, from: Uuid, to: Uuid) -> NewMessage {
        NewMessage {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: from,
            receiver_id: to,
            envelope: SealedEnvelope {
                ciphertext: "ct".into(),
                wrapped_key_for_sender: "ks".into(),
                wrapped_key_for_receiver: "kr".into(),
            },
            envelope_version: 1,
            integrity_tag: "tag".into(),
            sent_at: now_micros(),
        }
    }

    #[tokio::test]
    async fn test_append_creates_missing_conversation() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation_id = Uuid::new_v4();

        let msg = store.append(draft(conversation_id, a, b)).await.unwrap();

        let created = store
            .find(ParticipantPair::new(b, a).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.id, conversation_id);
        assert_eq!(created.updated_at, msg.sent_at);
        assert_eq!(store.message_count(), 1);
    }

    #[tokio::test]
    async fn test_append_under_stale_conversation_id_writes_nothing() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let existing = store
            .get_or_create(ParticipantPair::new(a, b).unwrap())
            .await
            .unwrap();

        let err = store
            .append(draft(Uuid::new_v4(), b, a))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.conversation_count(), 1);
        assert_eq!(store.message_count(), 0);
        let unchanged = store.find(existing.pair()).await.unwrap().unwrap();
        assert_eq!(unchanged, existing);
    }

    #[tokio::test]
    async fn test_touch_only_moves_forward() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pair = ParticipantPair::new(a, b).unwrap();
        let created = store.get_or_create(pair).await.unwrap();

        store.touch(created.id).await.unwrap();
        let touched = store.find(pair).await.unwrap().unwrap().updated_at;
        assert!(touched >= created.updated_at);

        let future = touched + chrono::Duration::hours(1);
        store
            .state
            .lock()
            .conversations
            .get_mut(&pair)
            .unwrap()
            .updated_at = future;
        store.touch(created.id).await.unwrap();
        assert_eq!(store.find(pair).await.unwrap().unwrap().updated_at, future);

        // Unknown ids are ignored.
        store.touch(Uuid::new_v4()).await.unwrap();
    }
}
