//! Document store for secret records.
//!
//! The store owns identifiers and timestamps. Every operation touches a
//! single document; nothing here spans records.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::secrets::model::{NewSecret, Secret, SecretChanges};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store operation timed out")]
    Timeout,

    #[error("store task failed: {0}")]
    Task(String),
}

/// Mutations are not cancellation safe: a write future dropped mid-flight may
/// leave memory and the backing medium out of step. Callers that bound them in
/// time must run them to completion on a task of their own.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn insert(&self, record: NewSecret) -> Result<Secret, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Secret>, StoreError>;

    /// All records, oldest first.
    async fn find_all(&self) -> Result<Vec<Secret>, StoreError>;

    /// `Ok(None)` when no record has this id.
    async fn update(&self, id: &str, changes: SecretChanges) -> Result<Option<Secret>, StoreError>;

    /// `Ok(false)` when no record has this id.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

pub(crate) type Documents = HashMap<String, Secret>;

pub(crate) fn insert_document(docs: &mut Documents, record: NewSecret) -> Secret {
    let now = Utc::now();
    let secret = Secret {
        id: Uuid::new_v4().to_string(),
        name: record.name,
        description: record.description,
        encrypted_value: record.value.ciphertext,
        iv: record.value.iv,
        created_at: now,
        updated_at: now,
    };
    docs.insert(secret.id.clone(), secret.clone());
    secret
}

pub(crate) fn update_document(docs: &mut Documents, id: &str, changes: SecretChanges) -> Option<Secret> {
    let secret = docs.get_mut(id)?;
    secret.name = changes.name;
    secret.description = changes.description;
    if let Some(value) = changes.value {
        secret.encrypted_value = value.ciphertext;
        secret.iv = value.iv;
    }
    secret.updated_at = Utc::now();
    Some(secret.clone())
}

pub(crate) fn sorted_documents(docs: &Documents) -> Vec<Secret> {
    let mut all: Vec<Secret> = docs.values().cloned().collect();
    all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    all
}
