use std::sync::Arc;

use chrono::{DateTime, Utc};
use crypto_core::{
    parse_public_key_pem, public_key_fingerprint, public_key_to_pem, ContentIntegrity,
    EnvelopeCipher, RecordContext, RsaPrivateKey, RsaPublicKey, SealedEnvelope,
    ENVELOPE_VERSION,
};
use tracing::instrument;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::audit::{AuditEvent, AuditSink};
use crate::directory::{self, BlockDirectory, FollowDirectory, KeyDirectory, UserDirectory};
use crate::error::{AppError, AppResult, Resource};
use crate::metrics;
use crate::models::{
    message::integrity_input, now_micros, ConversationSummary, Message, NewMessage,
    PageRequest, ParticipantPair, SentMessage, UserKey,
};
use crate::store::{ConversationStore, MessageStore};

/// Upper bound on a single plaintext body.
pub const MAX_PLAINTEXT_BYTES: usize = 64 * 1024;

pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Everything the messaging core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub keys: Arc<dyn KeyDirectory>,
    pub blocks: Arc<dyn BlockDirectory>,
    pub follows: Arc<dyn FollowDirectory>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub audit: Arc<dyn AuditSink>,
}

/// Orchestrates sends and reads between two participants.
///
/// A send walks validated → encrypted → persisted → acknowledged; every rejection happens
/// before any key is touched or any row is written.
pub struct MessagingService {
    deps: Collaborators,
    cipher: EnvelopeCipher,
    integrity: ContentIntegrity,
    max_page_size: u32,
}

impl MessagingService {
    pub fn new(deps: Collaborators, integrity: ContentIntegrity) -> Self {
        Self {
            deps,
            cipher: EnvelopeCipher::new(),
            integrity,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    #[instrument(skip(self, plaintext))]
    pub async fn send(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        plaintext: &[u8],
    ) -> AppResult<SentMessage> {
        if sender_id == receiver_id {
            metrics::record_send_rejection("self_message");
            return Err(AppError::SelfMessage);
        }
        if plaintext.is_empty() || plaintext.len() > MAX_PLAINTEXT_BYTES {
            metrics::record_send_rejection("invalid_body");
            return Err(AppError::Validation(format!(
                "message body must be between 1 and {MAX_PLAINTEXT_BYTES} bytes"
            )));
        }
        if !self.deps.users.exists(receiver_id).await? {
            metrics::record_send_rejection("receiver_not_found");
            return Err(AppError::NotFound(Resource::User));
        }

        let verdict = directory::can_message(
            self.deps.users.as_ref(),
            self.deps.blocks.as_ref(),
            self.deps.follows.as_ref(),
            sender_id,
            receiver_id,
        )
        .await?;
        if !verdict.is_allowed() {
            metrics::record_send_rejection(verdict.reason());
            tracing::info!(reason = verdict.reason(), "send denied");
            self.audit(AuditEvent::send_denied(sender_id, receiver_id, verdict.reason()))
                .await;
            return Err(AppError::PermissionDenied(verdict.reason().to_string()));
        }

        let sender_key = self.public_key_of(sender_id).await?;
        let receiver_key = self.public_key_of(receiver_id).await?;
        let envelope = self.cipher.encrypt(plaintext, &sender_key, &receiver_key)?;

        let pair = ParticipantPair::new(sender_id, receiver_id)?;
        let message_id = Uuid::new_v4();
        let sent_at = now_micros();

        let stored = match self
            .persist(pair, message_id, sender_id, receiver_id, &envelope, sent_at)
            .await
        {
            Err(AppError::Conflict(reason)) => {
                metrics::CONVERSATION_UPSERT_RETRIES_TOTAL.inc();
                tracing::warn!(%reason, "conversation upsert conflicted, retrying once");
                self.persist(pair, message_id, sender_id, receiver_id, &envelope, sent_at)
                    .await?
            }
            other => other?,
        };

        metrics::MESSAGES_SENT_TOTAL.inc();
        tracing::info!(
            message_id = %stored.id,
            conversation_id = %stored.conversation_id,
            "message sent"
        );

        self.audit(AuditEvent::message_sent(
            sender_id,
            receiver_id,
            stored.conversation_id,
            stored.id,
        ))
        .await;

        Ok(SentMessage {
            message_id: stored.id,
            conversation_id: stored.conversation_id,
            sent_at: stored.sent_at,
        })
    }

    /// Page of the conversation as `viewer` sees it. Fetching marks the peer's messages read;
    /// if that update fails the page is still returned.
    ///
    /// The mark-read update is awaited before returning so the page reports the read state it
    /// caused. It is a single indexed bulk UPDATE, so this adds one round trip to the read.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        viewer_id: Uuid,
        peer_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<Message>> {
        ensure_distinct(viewer_id, peer_id)?;
        if !self.deps.users.exists(peer_id).await? {
            return Err(AppError::NotFound(Resource::User));
        }

        let page = page.clamp(self.max_page_size);
        let mut messages = self
            .deps
            .messages
            .list_between(viewer_id, peer_id, page)
            .await?;

        for message in &messages {
            if !self.verify_integrity(message) {
                tracing::warn!(
                    message_id = %message.id,
                    conversation_id = %message.conversation_id,
                    "stored message failed integrity check"
                );
            }
        }

        match self.deps.messages.mark_read_from_peer(peer_id, viewer_id).await {
            Ok(marked) => {
                if marked > 0 {
                    tracing::debug!(marked, "messages marked read");
                }
                for message in messages
                    .iter_mut()
                    .filter(|m| m.sender_id == peer_id && m.receiver_id == viewer_id)
                {
                    message.is_read = true;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to mark messages read");
            }
        }

        Ok(messages)
    }

    /// Explicitly mark everything `peer_id` sent to `viewer_id` as read.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, viewer_id: Uuid, peer_id: Uuid) -> AppResult<u64> {
        ensure_distinct(viewer_id, peer_id)?;
        self.deps.messages.mark_read_from_peer(peer_id, viewer_id).await
    }

    pub async fn conversations(
        &self,
        viewer_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Vec<ConversationSummary>> {
        let page = page.clamp(self.max_page_size);
        self.deps.conversations.list_for_user(viewer_id, page).await
    }

    pub async fn unread_count(&self, viewer_id: Uuid, peer_id: Uuid) -> AppResult<i64> {
        ensure_distinct(viewer_id, peer_id)?;
        self.deps.messages.unread_count(viewer_id, peer_id).await
    }

    /// Hide the whole conversation from `viewer_id` only. Idempotent; returns rows changed.
    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, viewer_id: Uuid, peer_id: Uuid) -> AppResult<u64> {
        let pair = ParticipantPair::new(viewer_id, peer_id)
            .map_err(|_| AppError::Validation("cannot delete a conversation with yourself".into()))?;

        let Some(conversation) = self.deps.conversations.find(pair).await? else {
            return Ok(0);
        };

        let deleted = self
            .deps
            .messages
            .soft_delete_conversation(viewer_id, peer_id)
            .await?;

        if deleted > 0 {
            tracing::info!(
                conversation_id = %conversation.id,
                deleted,
                "conversation soft-deleted for viewer"
            );
            self.audit(AuditEvent::conversation_deleted(
                viewer_id,
                peer_id,
                conversation.id,
                deleted,
            ))
            .await;
        }

        Ok(deleted)
    }

    /// Recover the plaintext of `message` for one of its two participants.
    pub fn decrypt_for_viewer(
        &self,
        message: &Message,
        viewer_id: Uuid,
        private_key: &RsaPrivateKey,
    ) -> AppResult<Zeroizing<Vec<u8>>> {
        let wrapped_key = message
            .wrapped_key_for(viewer_id)
            .ok_or_else(|| AppError::PermissionDenied("not a participant".into()))?;

        if !self.verify_integrity(message) {
            tracing::warn!(message_id = %message.id, "refusing to decrypt tampered message");
            return Err(AppError::Crypto);
        }

        Ok(self
            .cipher
            .decrypt(&message.ciphertext, wrapped_key, private_key)?)
    }

    /// Validate and store `public_key_pem` as the user's only active key.
    #[instrument(skip(self, public_key_pem))]
    pub async fn register_key(&self, user_id: Uuid, public_key_pem: &str) -> AppResult<UserKey> {
        if !self.deps.users.exists(user_id).await? {
            return Err(AppError::NotFound(Resource::User));
        }

        let public_key = parse_public_key_pem(public_key_pem).map_err(|_| {
            AppError::Validation(
                "public key must be an SPKI PEM encoded RSA key of at least 2048 bits".into(),
            )
        })?;

        let key = UserKey {
            user_id,
            public_key_pem: public_key_to_pem(&public_key)?,
            fingerprint: public_key_fingerprint(&public_key)?,
            registered_at: Utc::now(),
        };
        let stored = self.deps.keys.register(&key).await?;

        tracing::info!(fingerprint = %stored.fingerprint, "public key registered");
        Ok(stored)
    }

    pub async fn lookup_key(&self, user_id: Uuid) -> AppResult<UserKey> {
        self.deps
            .keys
            .lookup(user_id)
            .await?
            .ok_or(AppError::NotFound(Resource::PublicKey))
    }

    async fn public_key_of(&self, user_id: Uuid) -> AppResult<RsaPublicKey> {
        let key = self.deps.keys.lookup(user_id).await?.ok_or_else(|| {
            metrics::record_send_rejection("public_key_not_found");
            AppError::NotFound(Resource::PublicKey)
        })?;
        Ok(parse_public_key_pem(&key.public_key_pem)?)
    }

    /// Sign and append one message. The conversation id is read first because the integrity
    /// tag covers it; the store creates the conversation with that id in the same unit of work
    /// as the insert, and reports `Conflict` if another send created it in between.
    async fn persist(
        &self,
        pair: ParticipantPair,
        message_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        envelope: &SealedEnvelope,
        sent_at: DateTime<Utc>,
    ) -> AppResult<Message> {
        let conversation_id = match self.deps.conversations.find(pair).await? {
            Some(conversation) => conversation.id,
            None => Uuid::new_v4(),
        };

        let integrity_tag = self.integrity.sign(
            &integrity_input(
                conversation_id,
                receiver_id,
                &envelope.ciphertext,
                &envelope.wrapped_key_for_sender,
                &envelope.wrapped_key_for_receiver,
            ),
            &RecordContext {
                timestamp: sent_at,
                author_id: sender_id,
                version: ENVELOPE_VERSION,
            },
        );

        self.deps
            .messages
            .append(NewMessage {
                id: message_id,
                conversation_id,
                sender_id,
                receiver_id,
                envelope: envelope.clone(),
                envelope_version: ENVELOPE_VERSION,
                integrity_tag,
                sent_at,
            })
            .await
    }

    fn verify_integrity(&self, message: &Message) -> bool {
        self.integrity.verify(
            &message.integrity_input(),
            &message.record_context(),
            &message.integrity_tag,
        )
    }

    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.deps.audit.record(&event).await {
            metrics::AUDIT_FAILURES_TOTAL.inc();
            tracing::warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                error = %e,
                "failed to record audit event"
            );
        }
    }
}

fn ensure_distinct(viewer_id: Uuid, peer_id: Uuid) -> AppResult<()> {
    if viewer_id == peer_id {
        return Err(AppError::Validation(
            "viewer and peer must be different users".into(),
        ));
    }
    Ok(())
}
