use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::security::codec::EncryptedValue;

/// Persisted secret record. `encrypted_value` is meaningless without `iv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub encrypted_value: String,
    pub iv: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    pub fn encrypted(&self) -> EncryptedValue {
        EncryptedValue {
            iv: self.iv.clone(),
            ciphertext: self.encrypted_value.clone(),
        }
    }
}

/// Record handed to the store on create; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub name: String,
    pub description: Option<String>,
    pub value: EncryptedValue,
}

/// Replacement fields for an update. `value` swaps IV and ciphertext together.
#[derive(Debug, Clone)]
pub struct SecretChanges {
    pub name: String,
    pub description: Option<String>,
    pub value: Option<EncryptedValue>,
}

/// Metadata-only projection returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Secret> for SecretSummary {
    fn from(secret: &Secret) -> Self {
        Self {
            id: secret.id.clone(),
            name: secret.name.clone(),
            description: secret.description.clone(),
            created_at: secret.created_at,
            updated_at: secret.updated_at,
        }
    }
}
