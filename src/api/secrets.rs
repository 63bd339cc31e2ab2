//! `/api/secrets` handlers. Each one admits the caller before touching the
//! body or the store.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::SharedState;
use crate::secrets::model::SecretSummary;
use crate::secrets::{CreateSecret, SecretError, UpdateSecret};
use crate::security::scopes::Permission;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "value")]
    pub secret_value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedSecret {
    pub decrypted_value: String,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

pub async fn list_secrets(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SecretSummary>>, ApiError> {
    state.gate.admit(&headers, &[Permission::Read]).await?;
    Ok(Json(state.secrets.list().await?))
}

pub async fn get_secret(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SecretSummary>, ApiError> {
    state.gate.admit(&headers, &[Permission::Read]).await?;
    Ok(Json(state.secrets.get(&id).await?))
}

pub async fn get_decrypted_secret(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DecryptedSecret>, ApiError> {
    let caller = state.gate.admit(&headers, &[Permission::Decrypt]).await?;

    match state.secrets.get_decrypted(&id).await {
        Ok(decrypted_value) => {
            state.security_log.secret_decrypted(&caller.subject, &id);
            Ok(Json(DecryptedSecret { decrypted_value }))
        }
        Err(SecretError::Decryption(e)) => {
            state.security_log.decryption_failed(&caller.subject, &id, &e.to_string());
            Err(SecretError::Decryption(e).into())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn create_secret(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SecretSummary>), ApiError> {
    let caller = state.gate.admit(&headers, &[Permission::Write]).await?;
    let payload: SecretPayload = parse_body(&body)?;

    let created = state
        .secrets
        .create(CreateSecret {
            name: payload.name,
            description: payload.description,
            value: payload.secret_value.unwrap_or_default(),
        })
        .await?;

    state.security_log.secret_created(&caller.subject, &created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_secret(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SecretSummary>, ApiError> {
    let caller = state.gate.admit(&headers, &[Permission::Write]).await?;
    let payload: SecretPayload = parse_body(&body)?;
    let value_rotated = payload.secret_value.as_deref().is_some_and(|v| !v.is_empty());

    let updated = state
        .secrets
        .update(
            &id,
            UpdateSecret {
                name: payload.name,
                description: payload.description,
                value: payload.secret_value,
            },
        )
        .await?;

    state.security_log.secret_updated(&caller.subject, &id, value_rotated);
    Ok(Json(updated))
}

pub async fn delete_secret(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let caller = state.gate.admit(&headers, &[Permission::Delete]).await?;
    state.secrets.delete(&id).await?;
    state.security_log.secret_deleted(&caller.subject, &id);
    Ok(Json(json!({ "message": "Secret deleted" })))
}
