use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{insert_document, sorted_documents, update_document, Documents, SecretStore, StoreError};
use crate::secrets::model::{NewSecret, Secret, SecretChanges};

/// Store persisted as a single JSON document on disk.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    docs: RwLock<Documents>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating it on first write if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let docs = match tokio::fs::read(&path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Documents::new(),
            Ok(raw) => {
                let records: Vec<Secret> = serde_json::from_slice(&raw)?;
                records.into_iter().map(|s| (s.id.clone(), s)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), count = docs.len(), "secret store opened");
        Ok(Self {
            path,
            docs: RwLock::new(docs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, docs: &Documents) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&sorted_documents(docs))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = docs.len(), "secret store persisted");
        Ok(())
    }
}

#[async_trait]
impl SecretStore for JsonFileStore {
    async fn insert(&self, record: NewSecret) -> Result<Secret, StoreError> {
        let mut docs = self.docs.write().await;
        let mut next = docs.clone();
        let secret = insert_document(&mut next, record);
        self.persist(&next).await?;
        *docs = next;
        Ok(secret)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Secret>, StoreError> {
        Ok(sorted_documents(&*self.docs.read().await))
    }

    async fn update(&self, id: &str, changes: SecretChanges) -> Result<Option<Secret>, StoreError> {
        let mut docs = self.docs.write().await;
        let mut next = docs.clone();
        let Some(secret) = update_document(&mut next, id, changes) else {
            return Ok(None);
        };
        self.persist(&next).await?;
        *docs = next;
        Ok(Some(secret))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().await;
        if !docs.contains_key(id) {
            return Ok(false);
        }
        let mut next = docs.clone();
        next.remove(id);
        self.persist(&next).await?;
        *docs = next;
        Ok(true)
    }
}
