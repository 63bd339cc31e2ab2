//! HTTP surface: router, shared state and server lifecycle.

pub mod error;
pub mod gate;
pub mod health;
pub mod secrets;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Settings;
use crate::secrets::SecretService;
use crate::security::security_log::SecurityLog;
use crate::security::codec::SecretCodec;
use crate::security::jwks::JwksCache;
use crate::security::token_validator::TokenValidator;
use crate::store::{JsonFileStore, MemoryStore, SecretStore};
use gate::AccessGate;

pub type SharedState = Arc<AppState>;

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub gate: AccessGate,
    pub secrets: SecretService,
    pub security_log: SecurityLog,
    pub cors_origin: Option<HeaderValue>,
}

impl AppState {
    pub fn new(validator: TokenValidator, secrets: SecretService) -> Self {
        let security_log = SecurityLog::new();
        Self {
            gate: AccessGate::new(validator, security_log.clone()),
            secrets,
            security_log,
            cors_origin: None,
        }
    }

    pub fn with_cors_origin(mut self, origin: HeaderValue) -> Self {
        self.cors_origin = Some(origin);
        self
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let keys = JwksCache::new(settings.jwks_settings())?;
        let validator = TokenValidator::new(settings.validator_settings(), Arc::new(keys));

        let store: Arc<dyn SecretStore> = match &settings.store_path {
            Some(path) => Arc::new(
                JsonFileStore::open(path)
                    .await
                    .with_context(|| format!("opening secret store at {}", path.display()))?,
            ),
            None => {
                warn!("SECRETS_STORE_PATH not set, secrets are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let codec = SecretCodec::new(settings.encryption_key.clone());
        let secrets = SecretService::new(store, codec, settings.store_timeout);

        let mut state = Self::new(validator, secrets);
        if let Some(origin) = &settings.client_origin_url {
            let origin = HeaderValue::from_str(origin).context("CLIENT_ORIGIN_URL is not a valid header value")?;
            state = state.with_cors_origin(origin);
        }
        Ok(state)
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" })))
}

pub fn create_router(state: SharedState) -> Router {
    let cors_origin = state.cors_origin.clone();

    let mut router = Router::new()
        .route("/api/health/public", any(health::public_health))
        .route("/api/health/admin", get(health::admin_health))
        .route(
            "/api/secrets",
            get(secrets::list_secrets).post(secrets::create_secret),
        )
        .route(
            "/api/secrets/{id}",
            get(secrets::get_secret)
                .put(secrets::update_secret)
                .delete(secrets::delete_secret),
        )
        .route("/api/secrets/{id}/decrypted", get(secrets::get_decrypted_secret))
        .fallback(not_found)
        .with_state(state);

    // CORS sits inside the header layers so preflight answers are hardened too.
    if let Some(origin) = cors_origin {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .max_age(Duration::from_secs(86400)),
        );
    }

    router = router
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ));

    router.layer(TraceLayer::new_for_http())
}

pub async fn serve(settings: Settings) -> Result<()> {
    let state = Arc::new(AppState::from_settings(&settings).await?);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, issuer = %settings.auth_issuer, "secrets API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("secrets API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
