//! Read-side collaborators the messaging core consults before it encrypts anything:
//! who exists, who holds which public key, who blocked whom and who follows whom.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{DmPermission, UserKey};

pub use memory::InMemoryDirectory;
pub use postgres::PgDirectory;

#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// The user's currently registered key, if any.
    async fn lookup(&self, user_id: Uuid) -> AppResult<Option<UserKey>>;

    /// Store `key` as the user's only active key, replacing any previous one.
    async fn register(&self, key: &UserKey) -> AppResult<UserKey>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: Uuid) -> AppResult<bool>;

    /// Falls back to [`DmPermission::default`] when the user never chose one.
    async fn messaging_policy(&self, user_id: Uuid) -> AppResult<DmPermission>;
}

#[async_trait]
pub trait BlockDirectory: Send + Sync {
    /// Whether `blocker` has blocked `blocked`.
    async fn is_blocked(&self, blocker: Uuid, blocked: Uuid) -> AppResult<bool>;

    async fn has_block_between(&self, a: Uuid, b: Uuid) -> AppResult<bool> {
        Ok(self.is_blocked(a, b).await? || self.is_blocked(b, a).await?)
    }
}

#[async_trait]
pub trait FollowDirectory: Send + Sync {
    async fn is_following(&self, follower: Uuid, followee: Uuid) -> AppResult<bool>;
}

/// Outcome of checking whether a sender may message a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanMessageResult {
    Allowed,
    /// A block exists in either direction
    Blocked,
    /// Recipient accepts no direct messages
    NotAllowed,
    /// Sender must follow the recipient first
    NeedToFollow,
    /// Both users must follow each other
    NeedMutualFollow,
}

impl CanMessageResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CanMessageResult::Allowed)
    }

    /// Short label for logs, metrics and audit metadata.
    pub fn reason(&self) -> &'static str {
        match self {
            CanMessageResult::Allowed => "allowed",
            CanMessageResult::Blocked => "blocked",
            CanMessageResult::NotAllowed => "recipient_accepts_no_messages",
            CanMessageResult::NeedToFollow => "followers_only",
            CanMessageResult::NeedMutualFollow => "mutuals_only",
        }
    }
}

/// Block check first, then the recipient's messaging policy.
pub async fn can_message(
    users: &dyn UserDirectory,
    blocks: &dyn BlockDirectory,
    follows: &dyn FollowDirectory,
    sender_id: Uuid,
    recipient_id: Uuid,
) -> AppResult<CanMessageResult> {
    if blocks.has_block_between(sender_id, recipient_id).await? {
        return Ok(CanMessageResult::Blocked);
    }

    match users.messaging_policy(recipient_id).await? {
        DmPermission::Anyone => Ok(CanMessageResult::Allowed),
        DmPermission::Nobody => Ok(CanMessageResult::NotAllowed),
        DmPermission::Followers => {
            if follows.is_following(sender_id, recipient_id).await? {
                Ok(CanMessageResult::Allowed)
            } else {
                Ok(CanMessageResult::NeedToFollow)
            }
        }
        DmPermission::Mutuals => {
            let mutual = follows.is_following(sender_id, recipient_id).await?
                && follows.is_following(recipient_id, sender_id).await?;
            if mutual {
                Ok(CanMessageResult::Allowed)
            } else {
                Ok(CanMessageResult::NeedMutualFollow)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(dir: &InMemoryDirectory, sender: Uuid, recipient: Uuid) -> CanMessageResult {
        can_message(dir, dir, dir, sender, recipient).await.unwrap()
    }

    #[tokio::test]
    async fn test_block_in_either_direction_denies() {
        let dir = InMemoryDirectory::new();
        let (a, b) = (dir.add_user(), dir.add_user());
        dir.block(b, a);

        assert_eq!(check(&dir, a, b).await, CanMessageResult::Blocked);
        assert_eq!(check(&dir, b, a).await, CanMessageResult::Blocked);
    }

    #[tokio::test]
    async fn test_policy_evaluation() {
        let dir = InMemoryDirectory::new();
        let (s, r) = (dir.add_user(), dir.add_user());

        assert_eq!(check(&dir, s, r).await, CanMessageResult::Allowed);

        dir.set_policy(r, DmPermission::Nobody);
        assert_eq!(check(&dir, s, r).await, CanMessageResult::NotAllowed);

        dir.set_policy(r, DmPermission::Followers);
        assert_eq!(check(&dir, s, r).await, CanMessageResult::NeedToFollow);
        dir.follow(s, r);
        assert!(check(&dir, s, r).await.is_allowed());

        dir.set_policy(r, DmPermission::Mutuals);
        assert_eq!(check(&dir, s, r).await, CanMessageResult::NeedMutualFollow);
        dir.follow(r, s);
        assert!(check(&dir, s, r).await.is_allowed());
    }
}
