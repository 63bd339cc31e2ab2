//! Secret Store Gateway: CRUD over the document store with the codec applied
//! to the value field. Plaintext only ever leaves through `get_decrypted`.

pub mod model;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::security::codec::{DecryptionError, SecretCodec};
use crate::store::{SecretStore, StoreError};
use model::{NewSecret, SecretChanges, SecretSummary};

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for `SecretService::create`.
#[derive(Debug, Clone, Default)]
pub struct CreateSecret {
    pub name: String,
    pub description: Option<String>,
    pub value: String,
}

/// Input for `SecretService::update`. A missing or empty `value` keeps the
/// stored ciphertext untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateSecret {
    pub name: String,
    pub description: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone)]
pub struct SecretService {
    store: Arc<dyn SecretStore>,
    codec: SecretCodec,
    store_timeout: Duration,
}

impl SecretService {
    pub fn new(store: Arc<dyn SecretStore>, codec: SecretCodec, store_timeout: Duration) -> Self {
        Self {
            store,
            codec,
            store_timeout,
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, SecretError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout.into()),
        }
    }

    /// Like `bounded`, but the write runs on its own task. A timeout stops the
    /// wait, not the write, so the store always finishes what it started.
    async fn committed<T, F, Fut>(&self, op: F) -> Result<T, SecretError>
    where
        F: FnOnce(Arc<dyn SecretStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(op(self.store.clone()));
        match tokio::time::timeout(self.store_timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => Err(StoreError::Task(e.to_string()).into()),
            Err(_) => {
                warn!("store write exceeded its deadline, letting it finish in the background");
                Err(StoreError::Timeout.into())
            }
        }
    }

    pub async fn create(&self, input: CreateSecret) -> Result<SecretSummary, SecretError> {
        if input.name.trim().is_empty() || input.value.is_empty() {
            return Err(SecretError::Validation("Name and secret value are required".into()));
        }
        let name = input.name.trim().to_string();

        let record = NewSecret {
            name,
            description: normalize(input.description),
            value: self.codec.encrypt(&input.value),
        };
        let secret = self
            .committed(|store| async move { store.insert(record).await })
            .await?;
        debug!(secret_id = %secret.id, "secret created");
        Ok(SecretSummary::from(&secret))
    }

    pub async fn list(&self) -> Result<Vec<SecretSummary>, SecretError> {
        let all = self.bounded(self.store.find_all()).await?;
        Ok(all.iter().map(SecretSummary::from).collect())
    }

    pub async fn get(&self, id: &str) -> Result<SecretSummary, SecretError> {
        let secret = self
            .bounded(self.store.find_by_id(id))
            .await?
            .ok_or(SecretError::NotFound)?;
        Ok(SecretSummary::from(&secret))
    }

    pub async fn get_decrypted(&self, id: &str) -> Result<String, SecretError> {
        let secret = self
            .bounded(self.store.find_by_id(id))
            .await?
            .ok_or(SecretError::NotFound)?;

        self.codec.decrypt(&secret.encrypted()).map_err(|e| {
            error!(secret_id = %id, error = %e, "stored secret could not be decrypted");
            SecretError::Decryption(e)
        })
    }

    pub async fn update(&self, id: &str, input: UpdateSecret) -> Result<SecretSummary, SecretError> {
        let name = required(&input.name, "name")?;
        let value = input
            .value
            .filter(|v| !v.is_empty())
            .map(|v| self.codec.encrypt(&v));

        let changes = SecretChanges {
            name,
            description: normalize(input.description),
            value,
        };
        let id = id.to_string();
        let secret = self
            .committed(|store| async move { store.update(&id, changes).await })
            .await?
            .ok_or(SecretError::NotFound)?;
        Ok(SecretSummary::from(&secret))
    }

    pub async fn delete(&self, id: &str) -> Result<(), SecretError> {
        let id = id.to_string();
        if self
            .committed(|store| async move { store.delete(&id).await })
            .await?
        {
            Ok(())
        } else {
            Err(SecretError::NotFound)
        }
    }
}

fn required(value: &str, field: &str) -> Result<String, SecretError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SecretError::Validation(format!("`{field}` must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn normalize(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}
