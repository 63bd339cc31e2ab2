use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{insert_document, sorted_documents, update_document, Documents, SecretStore, StoreError};
use crate::secrets::model::{NewSecret, Secret, SecretChanges};

/// In-memory store; contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<RwLock<Documents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn insert(&self, record: NewSecret) -> Result<Secret, StoreError> {
        let mut docs = self.docs.write().await;
        Ok(insert_document(&mut docs, record))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Secret>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Secret>, StoreError> {
        let docs = self.docs.read().await;
        Ok(sorted_documents(&docs))
    }

    async fn update(&self, id: &str, changes: SecretChanges) -> Result<Option<Secret>, StoreError> {
        let mut docs = self.docs.write().await;
        Ok(update_document(&mut docs, id, changes))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().await;
        Ok(docs.remove(id).is_some())
    }
}
