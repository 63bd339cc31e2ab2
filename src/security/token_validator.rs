use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::security::jwks::{KeyDiscoveryError, SigningKeySource};
use crate::security::scopes::Scopes;

/// Why a bearer token was not accepted.
///
/// Every variant except `KeyDiscovery` means the caller is unauthenticated.
/// `KeyDiscovery` is an upstream failure and must not be reported as a 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer token")]
    MissingToken,

    #[error("token signature could not be verified")]
    InvalidSignature,

    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    #[error("token has expired")]
    ExpiredToken,

    #[error(transparent)]
    KeyDiscovery(#[from] KeyDiscoveryError),
}

/// Caller identity and permissions extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub subject: String,
    pub permissions: Scopes,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    exp: i64,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Extract the raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    pub issuer: String,
    pub audience: String,
    pub leeway_secs: u64,
}

/// Verifies RS256 access tokens issued by the trusted identity provider.
#[derive(Clone)]
pub struct TokenValidator {
    settings: ValidatorSettings,
    keys: Arc<dyn SigningKeySource>,
}

impl TokenValidator {
    pub fn new(settings: ValidatorSettings, keys: Arc<dyn SigningKeySource>) -> Self {
        Self { settings, keys }
    }

    pub async fn validate(&self, raw: &str) -> Result<AccessToken, AuthError> {
        let header = decode_header(raw).map_err(|e| {
            debug!(error = %e, "undecodable token header");
            AuthError::InvalidSignature
        })?;
        if header.alg != Algorithm::RS256 {
            debug!(alg = ?header.alg, "rejecting token with unexpected algorithm");
            return Err(AuthError::InvalidSignature);
        }

        let key = self
            .keys
            .key_for(header.kid.as_deref())
            .await?
            .ok_or_else(|| {
                debug!(kid = ?header.kid, "no signing key for token");
                AuthError::InvalidSignature
            })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.leeway = self.settings.leeway_secs;

        let data = decode::<Claims>(raw, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidIssuer => AuthError::InvalidClaims("issuer mismatch".into()),
            ErrorKind::InvalidAudience => AuthError::InvalidClaims("audience mismatch".into()),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::InvalidClaims(format!("missing claim `{claim}`"))
            }
            ErrorKind::ImmatureSignature => AuthError::InvalidClaims("token not yet valid".into()),
            ErrorKind::Json(_) => AuthError::InvalidClaims("claims do not match expected shape".into()),
            _ => AuthError::InvalidSignature,
        })?;

        let claims = data.claims;
        let mut permissions: Scopes = claims.permissions.iter().collect();
        if let Some(scope) = claims.scope.as_deref() {
            permissions.extend(scope.split_whitespace());
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaims("exp out of range".into()))?;

        Ok(AccessToken {
            subject: claims.sub,
            permissions,
            expires_at,
        })
    }
}
