//! Process configuration, read once at startup from the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::security::codec::{CodecKeyError, EncryptionKey};
use crate::security::jwks::JwksSettings;
use crate::security::token_validator::ValidatorSettings;

pub const DEFAULT_PORT: u16 = 6060;

#[derive(Debug, Error)]
pub enum StartupConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{var}`: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("invalid `ENCRYPTION_KEY`: {0}")]
    EncryptionKey(#[from] CodecKeyError),
}

#[derive(Clone)]
pub struct Settings {
    pub auth_domain: String,
    pub auth_audience: String,
    pub auth_issuer: String,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub jwks_fetch_timeout: Duration,
    pub jwks_fetch_attempts: u32,
    pub jwt_leeway_secs: u64,
    pub encryption_key: EncryptionKey,
    pub port: u16,
    pub client_origin_url: Option<String>,
    pub store_path: Option<PathBuf>,
    pub store_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("auth_domain", &self.auth_domain)
            .field("auth_audience", &self.auth_audience)
            .field("auth_issuer", &self.auth_issuer)
            .field("jwks_url", &self.jwks_url)
            .field("port", &self.port)
            .field("client_origin_url", &self.client_origin_url)
            .field("store_path", &self.store_path)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, StartupConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |var: &'static str| get(var).ok_or(StartupConfigError::Missing(var));

        let auth_domain = require("AUTH_DOMAIN")?
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        let auth_audience = require("AUTH_AUDIENCE")?;
        let encryption_key = EncryptionKey::from_hex(&require("ENCRYPTION_KEY")?)?;

        let auth_issuer = get("AUTH_ISSUER").unwrap_or_else(|| format!("https://{auth_domain}/"));
        let jwks_url =
            get("AUTH_JWKS_URL").unwrap_or_else(|| format!("https://{auth_domain}/.well-known/jwks.json"));

        let parse = |var: &'static str| -> Result<Option<u64>, StartupConfigError> {
            get(var).map(|raw| parse_number(var, &raw)).transpose()
        };

        let positive_secs = |var: &'static str, default: u64| -> Result<Duration, StartupConfigError> {
            match parse(var)?.unwrap_or(default) {
                0 => Err(StartupConfigError::Invalid {
                    var,
                    reason: "must be greater than zero".into(),
                }),
                secs => Ok(Duration::from_secs(secs)),
            }
        };
        let jwks_cache_ttl = positive_secs("JWKS_CACHE_TTL_SECS", 600)?;
        let jwks_fetch_timeout = positive_secs("JWKS_FETCH_TIMEOUT_SECS", 5)?;
        let store_timeout = positive_secs("STORE_TIMEOUT_SECS", 5)?;

        let jwks_fetch_attempts = parse("JWKS_FETCH_ATTEMPTS")?.unwrap_or(3);
        if jwks_fetch_attempts == 0 {
            return Err(StartupConfigError::Invalid {
                var: "JWKS_FETCH_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }
        let jwks_fetch_attempts = u32::try_from(jwks_fetch_attempts).map_err(|e| StartupConfigError::Invalid {
            var: "JWKS_FETCH_ATTEMPTS",
            reason: e.to_string(),
        })?;

        let port = match get("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            auth_domain,
            auth_audience,
            auth_issuer,
            jwks_url,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            jwks_fetch_attempts,
            jwt_leeway_secs: parse("JWT_LEEWAY_SECS")?.unwrap_or(30),
            encryption_key,
            port,
            client_origin_url: get("CLIENT_ORIGIN_URL"),
            store_path: get("SECRETS_STORE_PATH").map(PathBuf::from),
            store_timeout,
        })
    }

    pub fn jwks_settings(&self) -> JwksSettings {
        JwksSettings {
            ttl: self.jwks_cache_ttl,
            fetch_timeout: self.jwks_fetch_timeout,
            max_attempts: self.jwks_fetch_attempts,
            ..JwksSettings::new(self.jwks_url.clone())
        }
    }

    pub fn validator_settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            issuer: self.auth_issuer.clone(),
            audience: self.auth_audience.clone(),
            leeway_secs: self.jwt_leeway_secs,
        }
    }
}

fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, StartupConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| StartupConfigError::Invalid {
        var,
        reason: format!("`{raw}`: {e}"),
    })
}
