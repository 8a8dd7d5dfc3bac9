//! Shared fixtures: in-memory collaborators and a small pool of RSA-2048 key pairs.
#![allow(dead_code)]

use std::sync::Arc;

use crypto_core::{public_key_to_pem, ContentIntegrity, RsaPrivateKey, RsaPublicKey};
use dm_service::audit::{AuditSink, InMemoryAuditSink};
use dm_service::directory::InMemoryDirectory;
use dm_service::models::PageRequest;
use dm_service::services::{Collaborators, MessagingService};
use dm_service::store::InMemoryStore;
use once_cell::sync::Lazy;
use uuid::Uuid;

/// Key generation is slow, so every test binary shares these.
static KEYS: Lazy<Vec<RsaPrivateKey>> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    (0..3)
        .map(|_| RsaPrivateKey::new(&mut rng, 2048).expect("generate RSA key"))
        .collect()
});

pub const INTEGRITY_SECRET: [u8; 32] = [0x5a; 32];

pub fn private_key(slot: usize) -> &'static RsaPrivateKey {
    &KEYS[slot % KEYS.len()]
}

pub fn public_key_pem(slot: usize) -> String {
    public_key_to_pem(&RsaPublicKey::from(private_key(slot))).expect("encode public key")
}

pub fn page() -> PageRequest {
    PageRequest::new(1, 50).expect("valid page")
}

pub fn integrity() -> ContentIntegrity {
    ContentIntegrity::new(&INTEGRITY_SECRET).expect("integrity secret")
}

pub struct Harness {
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub service: Arc<MessagingService>,
}

impl Harness {
    pub fn new() -> Self {
        let audit = Arc::new(InMemoryAuditSink::new());
        Self::build(audit.clone(), audit)
    }

    /// Same wiring, but audit events go to `sink`.
    pub fn with_audit_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self::build(Arc::new(InMemoryAuditSink::new()), sink)
    }

    fn build(audit: Arc<InMemoryAuditSink>, sink: Arc<dyn AuditSink>) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryStore::new());
        let deps = Collaborators {
            users: directory.clone(),
            keys: directory.clone(),
            blocks: directory.clone(),
            follows: directory.clone(),
            conversations: store.clone(),
            messages: store.clone(),
            audit: sink,
        };
        let service = Arc::new(MessagingService::new(deps, integrity()));

        Self {
            directory,
            store,
            audit,
            service,
        }
    }

    /// A user whose public key comes from `slot`.
    pub async fn user_with_key(&self, slot: usize) -> Uuid {
        let user = self.directory.add_user();
        self.service
            .register_key(user, &public_key_pem(slot))
            .await
            .expect("register key");
        user
    }
}
