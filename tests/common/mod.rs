#![allow(dead_code)]

//! Shared fixtures for integration tests.

use axum::Router;
use axum::body::Body;
use axum::http::{header, Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use secrets_api::api::{create_router, AppState};
use secrets_api::secrets::SecretService;
use secrets_api::security::codec::{EncryptionKey, SecretCodec};
use secrets_api::security::jwks::{SigningKeySource, StaticKeySet};
use secrets_api::security::token_validator::{TokenValidator, ValidatorSettings};
use secrets_api::store::{MemoryStore, SecretStore};

pub use secrets_api::security::test_keys::*;

pub const ENCRYPTION_KEY_HEX: &str = "8f3a1c5e7b9d2f4a6c8e0b1d3f5a7c9e2b4d6f8a0c1e3b5d7f9a2c4e6b8d0f1a";

pub fn validator_with(keys: Arc<dyn SigningKeySource>) -> TokenValidator {
    TokenValidator::new(
        ValidatorSettings {
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
            leeway_secs: 0,
        },
        keys,
    )
}

pub fn secret_service(store: Arc<dyn SecretStore>) -> SecretService {
    let key = EncryptionKey::from_hex(ENCRYPTION_KEY_HEX).unwrap();
    SecretService::new(store, SecretCodec::new(key), Duration::from_secs(5))
}

pub fn static_keys() -> Arc<dyn SigningKeySource> {
    Arc::new(StaticKeySet::from_rsa_pem(TEST_KID, SIGNING_PUBLIC_PEM).unwrap())
}

pub fn test_state(store: Arc<dyn SecretStore>) -> AppState {
    AppState::new(validator_with(static_keys()), secret_service(store))
}

pub fn test_router() -> Router {
    create_router(Arc::new(test_state(Arc::new(MemoryStore::new()))))
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
