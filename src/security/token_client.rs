use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client for the identity provider's client-credentials grant.
///
/// Not used on the request path; it mints tokens for operators and tests.
#[derive(Debug, Clone)]
pub struct TokenClient {
    token_url: String,
    audience: String,
    http_client: Client,
}

impl TokenClient {
    pub fn new(token_url: impl Into<String>, audience: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("creating HTTP client")?;

        Ok(Self {
            token_url: token_url.into(),
            audience: audience.into(),
            http_client,
        })
    }

    /// `https://{domain}/oauth/token`
    pub fn for_domain(domain: &str, audience: impl Into<String>) -> Result<Self> {
        Self::new(format!("https://{}/oauth/token", domain.trim_end_matches('/')), audience)
    }

    pub async fn fetch_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        debug!(url = %self.token_url, client_id, "requesting client-credentials token");

        let payload = ClientCredentialsRequest {
            grant_type: "client_credentials",
            client_id,
            client_secret,
            audience: &self.audience,
        };

        let response = self
            .http_client
            .post(&self.token_url)
            .json(&payload)
            .send()
            .await
            .context("sending token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "token request failed with status {}: {}",
                status,
                body
            ));
        }

        let token: TokenResponse = response.json().await.context("parsing token response")?;
        token.access_token.context("access_token not found in token response")
    }
}
