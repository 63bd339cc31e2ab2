use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::error::ApiError;
use super::SharedState;
use crate::security::scopes::Permission;

#[derive(Debug, Serialize)]
pub struct HealthMessage {
    pub status: &'static str,
}

pub async fn public_health() -> Json<HealthMessage> {
    Json(HealthMessage {
        status: "All systems operational.",
    })
}

pub async fn admin_health(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<HealthMessage>, ApiError> {
    state.gate.admit(&headers, &[Permission::Read]).await?;
    Ok(Json(HealthMessage {
        status: "This is an admin message.",
    }))
}
