use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::backend::{Backend, Request};
use crate::store::Storage;

pub mod handlers;

/// Shared application state passed to handlers.
pub struct AppState {
    pub backend: Arc<Backend>,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(backend: Arc<Backend>, storage: Arc<dyn Storage>) -> Self {
        Self { backend, storage }
    }

    pub(crate) fn request(&self) -> Request {
        Request::new(self.storage.clone())
    }
}

/// Build the HTTP router over one backend.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(handlers::metrics))
        .route("/config", get(handlers::list_configs))
        .route(
            "/config/:name",
            get(handlers::read_config)
                .post(handlers::write_config)
                .patch(handlers::patch_config)
                .delete(handlers::delete_config),
        )
        .route("/config/:name/rotate", post(handlers::rotate_config))
        .route("/revoke", post(handlers::revoke))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
