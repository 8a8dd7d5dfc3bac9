use crate::{
    audit::{InMemoryAuditSink, PgAuditSink},
    config::Config,
    directory::{InMemoryDirectory, PgDirectory},
    services::{Collaborators, MessagingService},
    store::{InMemoryStore, PgStore},
};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MessagingService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: Arc<MessagingService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}

/// Every collaborator backed by the same Postgres pool.
pub fn postgres_collaborators(db: Pool<Postgres>) -> Collaborators {
    let directory = Arc::new(PgDirectory::new(db.clone()));
    let store = Arc::new(PgStore::new(db.clone()));

    Collaborators {
        users: directory.clone(),
        keys: directory.clone(),
        blocks: directory.clone(),
        follows: directory,
        conversations: store.clone(),
        messages: store,
        audit: Arc::new(PgAuditSink::new(db)),
    }
}

/// Process-local collaborators sharing one directory and one store.
pub fn memory_collaborators(directory: Arc<InMemoryDirectory>) -> Collaborators {
    let store = Arc::new(InMemoryStore::new());

    Collaborators {
        users: directory.clone(),
        keys: directory.clone(),
        blocks: directory.clone(),
        follows: directory,
        conversations: store.clone(),
        messages: store,
        audit: Arc::new(InMemoryAuditSink::new()),
    }
}
