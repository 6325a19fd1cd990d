//! HTTP server module

mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::feedback::FeedbackService;

pub use api::{FeedbackBody, FeedbackResponse, FollowUpBody, FollowUpResponse, HealthResponse};

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState {
    pub service: FeedbackService,
}

impl AppState {
    pub fn new(service: FeedbackService) -> Self {
        Self { service }
    }
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/feedback", post(api::feedback))
        .route("/api/qa", post(api::follow_up))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(state)
}
