//! Racing sends between the same two users must converge on one conversation.

mod common;

use std::sync::Arc;

use common::{page, Harness};
use dm_service::models::ParticipantPair;
use dm_service::store::ConversationStore;
use dm_service::store::InMemoryStore;
use futures::future::join_all;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_yields_one_conversation() {
    let store = Arc::new(InMemoryStore::new());
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let tasks = (0..16).map(|i| {
        let store = store.clone();
        // Alternate argument order; both must canonicalize to the same pair.
        let pair = if i % 2 == 0 {
            ParticipantPair::new(a, b)
        } else {
            ParticipantPair::new(b, a)
        }
        .unwrap();
        tokio::spawn(async move { store.get_or_create(pair).await.unwrap().id })
    });

    let ids: Vec<Uuid> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(store.conversation_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_from_both_sides_share_a_conversation() {
    let h = Harness::new();
    let u1 = h.user_with_key(0).await;
    let u2 = h.user_with_key(1).await;

    let tasks = (0..8).map(|i| {
        let service = h.service.clone();
        let (from, to) = if i % 2 == 0 { (u1, u2) } else { (u2, u1) };
        tokio::spawn(async move { service.send(from, to, b"race").await.unwrap() })
    });

    let sent: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(sent
        .iter()
        .all(|s| s.conversation_id == sent[0].conversation_id));
    assert_eq!(h.store.conversation_count(), 1);
    assert_eq!(h.store.message_count(), 8);

    let listed = h.service.conversations(u1, page()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].unread_count, 4);
}
