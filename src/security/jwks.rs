use anyhow::{anyhow, Context};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The identity provider's key set could not be obtained.
#[derive(Debug, Clone, Error)]
#[error("signing key discovery failed after {attempts} attempt(s): {reason}")]
pub struct KeyDiscoveryError {
    pub attempts: u32,
    pub reason: String,
}

/// Source of public keys used to verify token signatures.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Key for the given `kid`. `Ok(None)` means the source is reachable but
    /// knows no such key. A token without `kid` matches only a single-key set.
    async fn key_for(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, KeyDiscoveryError>;
}

type KeyList = Vec<(Option<String>, DecodingKey)>;

fn select(keys: &KeyList, kid: Option<&str>) -> Option<DecodingKey> {
    match kid {
        Some(kid) => keys
            .iter()
            .find(|(id, _)| id.as_deref() == Some(kid))
            .map(|(_, key)| key.clone()),
        None if keys.len() == 1 => Some(keys[0].1.clone()),
        None => None,
    }
}

#[derive(Debug, Clone)]
pub struct JwksSettings {
    pub url: String,
    /// Maximum age of a fetched key set before it is refetched.
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    /// An unknown `kid` only triggers a refetch when the cached set is older than this.
    pub min_refresh_interval: Duration,
}

impl JwksSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ttl: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(5),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            min_refresh_interval: Duration::from_secs(30),
        }
    }
}

struct CachedKeys {
    keys: KeyList,
    fetched_at: Instant,
}

/// Outcome of the most recent refresh that failed, shared with callers that
/// queued behind it.
struct FailedRefresh {
    at: Instant,
    error: KeyDiscoveryError,
}

/// Time-bounded cache of a remote JSON Web Key Set.
pub struct JwksCache {
    settings: JwksSettings,
    http_client: Client,
    cached: RwLock<Option<CachedKeys>>,
    /// Held for the duration of a refresh; carries the last failure.
    refresh: Mutex<Option<FailedRefresh>>,
}

impl fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksCache")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    pub fn new(settings: JwksSettings) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .context("creating JWKS HTTP client")?;

        debug!(url = %settings.url, ttl_secs = settings.ttl.as_secs(), "JWKS cache initialized");

        Ok(Self {
            settings,
            http_client,
            cached: RwLock::new(None),
            refresh: Mutex::new(None),
        })
    }

    #[cfg(test)]
    async fn age(&self) -> Option<Duration> {
        self.cached.read().await.as_ref().map(|c| c.fetched_at.elapsed())
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.settings.retry_base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    async fn fetch_once(&self) -> anyhow::Result<KeyList> {
        let response = self
            .http_client
            .get(&self.settings.url)
            .send()
            .await
            .context("sending JWKS request")?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("JWKS fetch failed with status {}", status));
        }

        let set: JwkSet = response.json().await.context("parsing JWKS response")?;

        let mut keys = Vec::with_capacity(set.keys.len());
        for jwk in &set.keys {
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push((jwk.common.key_id.clone(), key)),
                Err(e) => debug!(kid = ?jwk.common.key_id, error = %e, "skipping unusable JWK"),
            }
        }

        if keys.is_empty() {
            return Err(anyhow!("JWKS contained no usable keys"));
        }
        Ok(keys)
    }

    async fn fetch_with_retry(&self) -> Result<KeyList, KeyDiscoveryError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut reason = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying JWKS fetch");
                sleep(delay).await;
            }

            match self.fetch_once().await {
                Ok(keys) => {
                    info!(url = %self.settings.url, count = keys.len(), "signing keys refreshed");
                    return Ok(keys);
                }
                Err(err) => {
                    warn!(
                        url = %self.settings.url,
                        attempt = attempt + 1,
                        error = %err,
                        "failed to fetch signing keys"
                    );
                    reason = format!("{err:#}");
                }
            }
        }

        Err(KeyDiscoveryError { attempts, reason })
    }
}

#[async_trait]
impl SigningKeySource for JwksCache {
    async fn key_for(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, KeyDiscoveryError> {
        let requested_at = Instant::now();
        {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.settings.ttl {
                    if let Some(key) = select(&cached.keys, kid) {
                        return Ok(Some(key));
                    }
                    if age < self.settings.min_refresh_interval {
                        return Ok(None);
                    }
                }
            }
        }

        let mut refresh = self.refresh.lock().await;

        // A refresh that failed while this request waited answers it too.
        if let Some(failed) = refresh.as_ref() {
            if failed.at >= requested_at {
                return Err(failed.error.clone());
            }
        }

        // Another request may have refreshed while this one waited for the lock.
        {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.settings.ttl && age < self.settings.min_refresh_interval {
                    return Ok(select(&cached.keys, kid));
                }
            }
        }

        let keys = match self.fetch_with_retry().await {
            Ok(keys) => keys,
            Err(err) => {
                // drop keys that are past their TTL rather than keep serving them
                let mut guard = self.cached.write().await;
                if guard
                    .as_ref()
                    .is_some_and(|c| c.fetched_at.elapsed() >= self.settings.ttl)
                {
                    *guard = None;
                }
                *refresh = Some(FailedRefresh {
                    at: Instant::now(),
                    error: err.clone(),
                });
                return Err(err);
            }
        };

        *refresh = None;
        let found = select(&keys, kid);
        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(found)
    }
}

/// Fixed, in-process key set (pinned keys, tests).
#[derive(Clone, Default)]
pub struct StaticKeySet {
    keys: KeyList,
}

impl StaticKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.push((Some(kid.into()), key));
        self
    }

    pub fn from_rsa_pem(kid: impl Into<String>, pem: &str) -> anyhow::Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).context("parsing RSA public key")?;
        Ok(Self::new().with_key(kid, key))
    }
}

#[async_trait]
impl SigningKeySource for StaticKeySet {
    async fn key_for(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, KeyDiscoveryError> {
        Ok(select(&self.keys, kid))
    }
}
