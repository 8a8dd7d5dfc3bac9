use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BlockDirectory, FollowDirectory, KeyDirectory, UserDirectory};
use crate::error::AppResult;
use crate::models::{DmPermission, UserKey};

#[derive(Default)]
struct DirectoryState {
    users: HashSet<Uuid>,
    policies: HashMap<Uuid, DmPermission>,
    keys: HashMap<Uuid, UserKey>,
    blocks: HashSet<(Uuid, Uuid)>,
    follows: HashSet<(Uuid, Uuid)>,
}

/// Process-local directory used by tests and `DM_STORAGE_BACKEND=memory`.
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    open: bool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory where every user id exists. Local runs have no user-service to seed from.
    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    /// Register a fresh user id and return it.
    pub fn add_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_user(id);
        id
    }

    pub fn insert_user(&self, user_id: Uuid) {
        self.state.write().users.insert(user_id);
    }

    pub fn set_policy(&self, user_id: Uuid, policy: DmPermission) {
        self.state.write().policies.insert(user_id, policy);
    }

    pub fn block(&self, blocker: Uuid, blocked: Uuid) {
        self.state.write().blocks.insert((blocker, blocked));
    }

    pub fn unblock(&self, blocker: Uuid, blocked: Uuid) {
        self.state.write().blocks.remove(&(blocker, blocked));
    }

    pub fn follow(&self, follower: Uuid, followee: Uuid) {
        self.state.write().follows.insert((follower, followee));
    }
}

#[async_trait]
impl KeyDirectory for InMemoryDirectory {
    async fn lookup(&self, user_id: Uuid) -> AppResult<Option<UserKey>> {
        Ok(self.state.read().keys.get(&user_id).cloned())
    }

    async fn register(&self, key: &UserKey) -> AppResult<UserKey> {
        self.state.write().keys.insert(key.user_id, key.clone());
        Ok(key.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn exists(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.open || self.state.read().users.contains(&user_id))
    }

    async fn messaging_policy(&self, user_id: Uuid) -> AppResult<DmPermission> {
        Ok(self
            .state
            .read()
            .policies
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BlockDirectory for InMemoryDirectory {
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> AppResult<bool> {
        Ok(self.state.read().blocks.contains(&(blocker, blocked)))
    }
}

#[async_trait]
impl FollowDirectory for InMemoryDirectory {
    async fn is_following(&self, follower: Uuid, followee: Uuid) -> AppResult<bool> {
        Ok(self.state.read().follows.contains(&(follower, followee)))
    }
}
