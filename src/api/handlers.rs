use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::AppState;
use crate::errors::Result;
use crate::models::{ConfigInput, ConfigResponse, LeasedSecret};

#[derive(Serialize)]
pub struct ConfigListResponse {
    pub names: Vec<String>,
}

/// GET /config: names of stored configurations
pub async fn list_configs(State(state): State<Arc<AppState>>) -> Result<Json<ConfigListResponse>> {
    let names = state.backend.list_configs(&state.request()).await?;
    Ok(Json(ConfigListResponse { names }))
}

/// GET /config/:name
pub async fn read_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ConfigResponse>> {
    let config = state.backend.read_config(&state.request(), &name).await?;
    Ok(Json(config))
}

/// POST /config/:name: create or replace
pub async fn write_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(input): Json<ConfigInput>,
) -> Result<Json<ConfigResponse>> {
    let config = state
        .backend
        .write_config(&state.request(), &name, input)
        .await?;
    Ok(Json(config))
}

/// PATCH /config/:name
pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(input): Json<ConfigInput>,
) -> Result<Json<ConfigResponse>> {
    let config = state
        .backend
        .patch_config(&state.request(), &name, input)
        .await?;
    Ok(Json(config))
}

/// DELETE /config/:name
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.backend.delete_config(&state.request(), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /config/:name/rotate: rotate the administrative token now
pub async fn rotate_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ConfigResponse>> {
    let config = state.backend.rotate(&state.request(), &name).await?;
    Ok(Json(config))
}

/// POST /revoke: end a lease and revoke its token. Empty body on success.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Json(secret): Json<LeasedSecret>,
) -> Result<StatusCode> {
    let req = state.request().with_secret(secret);
    state.backend.revoke(&req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /metrics: Prometheus text format
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.backend.metrics().render(),
    )
}
