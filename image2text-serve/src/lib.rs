//! The HTTP front end of image2text.
//!
//! - `GET /health`: static liveness status.
//! - `GET /api/model`: the configured default model identifier.
//! - `POST /api/describe`: multipart upload of one or more `files`, with optional
//!   `prompt`, `max_new_tokens` and `temperature` fields.

mod describe;
mod error;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use image2text::{vlm::BackendLoader, InferenceService, ResultPersister};
use serde_json::json;

pub use describe::DescribeResponse;
pub use error::ApiError;

/// Default cap on the size of a describe request body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Everything the handlers share.
pub struct AppState<L: BackendLoader> {
    /// The inference pipeline.
    pub service: Arc<InferenceService<L>>,
    /// Where results are written.
    pub persister: ResultPersister,
    /// Give up on a generation after this long, discarding its backend.
    pub generation_timeout: Option<Duration>,
    /// Maximum size of a describe request body.
    pub max_upload_bytes: usize,
}

impl<L: BackendLoader> AppState<L> {
    /// State with no generation timeout and the default upload limit.
    pub fn new(service: InferenceService<L>, persister: ResultPersister) -> Self {
        Self {
            service: Arc::new(service),
            persister,
            generation_timeout: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set the generation timeout.
    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Set the upload limit.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build the router.
pub fn app<L: BackendLoader + 'static>(state: AppState<L>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(|| async { "Welcome to image2text!" }))
        .route("/health", get(health))
        .route("/api/model", get(model::<L>))
        .route(
            "/api/describe",
            post(describe::describe::<L>)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(Arc::new(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn model<L: BackendLoader + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> Json<serde_json::Value> {
    Json(json!({ "model": state.service.config().default_model.as_str() }))
}
