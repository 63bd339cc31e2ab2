use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::secrets::SecretError;
use crate::security::jwks::KeyDiscoveryError;
use crate::security::scopes::ForbiddenError;
use crate::security::token_validator::AuthError;
use crate::store::StoreError;

/// Every failure a handler can return. Each variant maps to exactly one
/// status code; authentication and authorization never share one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Unauthenticated(AuthError),

    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),

    #[error(transparent)]
    KeyDiscovery(#[from] KeyDiscoveryError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::KeyDiscovery(e) => ApiError::KeyDiscovery(e),
            other => ApiError::Unauthenticated(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::KeyDiscovery(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Secret(SecretError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Secret(SecretError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Secret(SecretError::Decryption(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Secret(SecretError::Store(StoreError::Timeout)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Secret(SecretError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller. Internals stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthenticated(AuthError::MissingToken) => "Requires authentication".into(),
            ApiError::Unauthenticated(AuthError::ExpiredToken) => "Token has expired".into(),
            ApiError::Unauthenticated(_) => "Invalid token".into(),
            ApiError::Forbidden(_) => "Permission denied".into(),
            ApiError::KeyDiscovery(_) => "Unable to verify token at this time".into(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Secret(SecretError::NotFound) => "Secret not found".into(),
            ApiError::Secret(SecretError::Validation(msg)) => msg.clone(),
            ApiError::Secret(SecretError::Decryption(_)) => "Error decrypting secret".into(),
            ApiError::Secret(SecretError::Store(StoreError::Timeout)) => "Secret store timed out".into(),
            ApiError::Secret(SecretError::Store(_)) => "Secret store error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let mut response = (status, Json(json!({ "message": self.public_message() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                ApiError::Unauthenticated(AuthError::MissingToken) => HeaderValue::from_static("Bearer"),
                _ => HeaderValue::from_static("Bearer error=\"invalid_token\""),
            };
            response.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        }
        response
    }
}
