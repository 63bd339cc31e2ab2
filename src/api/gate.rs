use axum::http::HeaderMap;

use super::error::ApiError;
use crate::security::security_log::SecurityLog;
use crate::security::scopes::{authorize, Permission};
use crate::security::token_validator::{bearer_token, AccessToken, AuthError, TokenValidator};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Admission check run at the top of every protected handler:
/// extract bearer, validate, authorize. Stops at the first failure.
#[derive(Clone)]
pub struct AccessGate {
    validator: TokenValidator,
    security_log: SecurityLog,
}

impl AccessGate {
    pub fn new(validator: TokenValidator, security_log: SecurityLog) -> Self {
        Self { validator, security_log }
    }

    pub async fn admit(&self, headers: &HeaderMap, required: &[Permission]) -> Result<AccessToken, ApiError> {
        let request_id = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok());
        let action = required
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let token = match self.authenticate(headers).await {
            Ok(token) => token,
            Err(AuthError::KeyDiscovery(e)) => {
                self.security_log.key_discovery_failed(request_id, &e.reason);
                return Err(ApiError::KeyDiscovery(e));
            }
            Err(e) => {
                self.security_log.auth_failure(request_id, &action, &e.to_string());
                return Err(e.into());
            }
        };

        if let Err(denied) = authorize(&token, required) {
            self.security_log.scope_denied(&token.subject, request_id, &action, &denied.missing);
            return Err(denied.into());
        }

        self.security_log.auth_success(&token.subject, request_id, &action);
        Ok(token)
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<AccessToken, AuthError> {
        let raw = bearer_token(headers)?;
        self.validator.validate(raw).await
    }
}
